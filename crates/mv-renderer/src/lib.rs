//! MV Renderer
//!
//! WGPU rendering pipeline for the MV model viewer.
//!
//! # Architecture
//!
//! - [`renderer::Renderer`] - per-frame orchestration and the draw callback
//! - [`skin::SkinCache`] - weighted bone accumulation into vertex records
//! - [`resources::MeshBufferTable`] / [`resources::TextureTable`] - GPU
//!   resource lifecycle
//! - [`uniforms`] - fixed-layout shader blocks and the surface flag word
//! - [`oit`] - per-pixel fragment lists and the transparency composite
//! - [`overlay::Overlay`] - 2D layers over the composited frame
//!
//! # Example
//!
//! ```ignore
//! use mv_renderer::{Renderer, RendererConfig};
//!
//! let config = RendererConfig::new(1280, 720, surface_format);
//! let mut renderer = Renderer::new(device, queue, config)?;
//!
//! renderer.render(&surface_view, |frame| {
//!     frame.draw_model(&model, None);
//! });
//! ```

pub mod camera;
pub mod context;
pub mod error;
pub mod lighting;
pub mod matrices;
pub mod oit;
pub mod overlay;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod skin;
pub mod uniforms;
pub mod vertex;

pub use camera::Camera;
pub use context::RenderContext;
pub use error::{RendererError, ShaderStage};
pub use lighting::{LIGHT_COUNT, Light, default_lights};
pub use matrices::RenderMatrices;
pub use oit::{FRAGMENT_LIST_NULL, MAX_FRAGMENTS_PER_PIXEL, Node, OitBuffer};
pub use overlay::{Overlay, OverlayStack};
pub use renderer::{CompositeImage, Frame, Renderer, RendererConfig};
pub use resources::{MeshBufferTable, MeshGpuHandle, TextureTable};
pub use settings::{RenderSettings, WireframeMode};
pub use skin::{CachedVertex, RegionMarker, SkinCache};
pub use vertex::{RecordKind, VertexRecords};
