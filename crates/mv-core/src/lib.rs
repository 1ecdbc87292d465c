//! Data model for the MV model viewer.
//!
//! This crate holds the plain data types exchanged between scene traversal
//! and the rendering pipeline:
//!
//! - [`mesh`] - mesh batches, vertices, corners and the model-node shape
//! - [`material`] - surface materials and blend factors
//! - [`color`] - 8-bit RGBA color
//! - [`texture`] - raw RGBA8 texture sets
//!
//! No GPU types appear here; uploading and drawing live in `mv-renderer`.

pub mod color;
pub mod material;
pub mod mesh;
pub mod texture;

pub use color::Color;
pub use material::{BlendFactor, FilterMode, Material, WrapMode};
pub use mesh::{Corner, DEFAULT_NORMAL, MeshBatch, MeshId, MeshVertex, ModelNode};
pub use texture::{Texture, TextureError, TextureSet, TextureSetId};
