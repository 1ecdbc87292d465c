//! Render orchestrator.
//!
//! Drives the per-frame sequence: exclusive render lock, fragment list
//! reset, uniform publication, the caller's draw callback, the transparency
//! composite, and the 2D overlay pass.

mod frame;
mod pipelines;

pub use frame::Frame;

use std::sync::Arc;

use parking_lot::Mutex;

use mv_core::{Color, MeshId, TextureSet, TextureSetId};

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::error::{RendererError, ShaderStage};
use crate::lighting::{LIGHT_COUNT, Light, default_lights};
use crate::oit::{Node, OitBuffer};
use crate::overlay::{Overlay, OverlayStack};
use crate::pipeline::PipelineConfig;
use crate::resources::{MeshBufferTable, TextureTable};
use crate::settings::{RenderSettings, WireframeMode};
use crate::skin::SkinCache;
use crate::uniforms::{CameraUniforms, FrameUniforms, LightingUniforms, SettingsUniforms};

use pipelines::SurfacePipelines;

/// One renderer at a time may run the 3D pass; the tables behind the draw
/// path are shared GPU state.
static RENDER_LOCK: Mutex<()> = Mutex::new(());

/// Renderer construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    /// Format of the texture views handed to [`Renderer::render`].
    pub output_format: wgpu::TextureFormat,
    /// Fraction of the maximum fragment pool kept allocated, 0 to 1.
    pub node_budget_fraction: f32,
    pub background: Color,
}

impl RendererConfig {
    pub fn new(width: u32, height: u32, output_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            output_format,
            node_budget_fraction: 0.4,
            background: Color::BLACK,
        }
    }
}

struct RenderTargets {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    output_depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTargets {
    fn new(ctx: &RenderContext, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = ctx.create_texture(&wgpu::TextureDescriptor {
            label: Some("Opaque Color Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = ctx.create_texture(&wgpu::TextureDescriptor {
            label: Some("Opaque Depth Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.depth_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_depth = ctx.create_texture(&wgpu::TextureDescriptor {
            label: Some("Output Depth Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.depth_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let output_depth_view = output_depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            depth,
            depth_view,
            output_depth_view,
            width,
            height,
        }
    }
}

/// Host-side image produced by the debug composite path.
pub struct CompositeImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA pixels, top row first.
    pub pixels: Vec<Color>,
}

/// The rendering pipeline.
pub struct Renderer {
    ctx: RenderContext,
    camera: Camera,
    settings: RenderSettings,
    lights: [Light; LIGHT_COUNT],
    wireframe_mode: WireframeMode,
    background: Color,

    skin: SkinCache,
    meshes: MeshBufferTable,
    textures: TextureTable,
    uniforms: FrameUniforms,
    oit: OitBuffer,
    pipelines: SurfacePipelines,
    overlays: OverlayStack,

    targets: RenderTargets,
    composite_layout: wgpu::BindGroupLayout,
    composite_bind_group: wgpu::BindGroup,
    composite_pipeline: wgpu::RenderPipeline,
}

impl Renderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        let ctx = RenderContext::new(device, queue, config.output_format);

        let camera = Camera::new(config.width as f32 / config.height.max(1) as f32);
        let uniforms = FrameUniforms::new(&ctx);
        let textures = TextureTable::new(&ctx);
        let oit = OitBuffer::new(&ctx, config.width, config.height, config.node_budget_fraction);
        let targets = RenderTargets::new(&ctx, config.width, config.height);

        let pipelines = SurfacePipelines::new(
            &ctx,
            uniforms.bind_group_layout().clone(),
            textures.bind_group_layout().clone(),
            oit.bind_group_layout().clone(),
            wgpu::TextureFormat::Rgba8Unorm,
        )?;

        let composite_layout = create_composite_layout(&ctx);
        let composite_bind_group = create_composite_bind_group(&ctx, &composite_layout, &targets, &oit);
        let composite_shader = ctx.create_shader_checked(
            include_str!("../shaders/composite.wgsl"),
            "composite",
            ShaderStage::Fragment,
        )?;
        let composite_pipeline = PipelineConfig::new(
            "Composite",
            config.output_format,
            &[&composite_layout],
        )
        .with_depth(ctx.depth_format())
        .with_depth_state(true, wgpu::CompareFunction::Always)
        .build(ctx.device(), &composite_shader);

        Ok(Self {
            ctx,
            camera,
            settings: RenderSettings::default(),
            lights: default_lights(),
            wireframe_mode: WireframeMode::None,
            background: config.background,
            skin: SkinCache::new(),
            meshes: MeshBufferTable::new(),
            textures,
            uniforms,
            oit,
            pipelines,
            overlays: OverlayStack::new(),
            targets,
            composite_layout,
            composite_bind_group,
            composite_pipeline,
        })
    }

    /// Renders one frame into `output`.
    ///
    /// The callback records mesh draws through the [`Frame`] it receives.
    /// The exclusive render lock is held until the transparency composite is
    /// submitted; overlays run outside of it.
    pub fn render(&mut self, output: &wgpu::TextureView, draw: impl FnOnce(&mut Frame<'_>)) {
        let guard = RENDER_LOCK.lock();

        let settings_offset = self.uniforms.begin_frame(
            &self.ctx,
            &CameraUniforms::from(&self.camera),
            &LightingUniforms::from(&self.lights),
            &SettingsUniforms::from(&self.settings),
        );
        self.oit.reset(&self.ctx);

        let mut encoder =
            self.ctx
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });

        {
            let background = self.background.to_vec4();
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mesh Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.x as f64,
                            g: background.y as f64,
                            b: background.z as f64,
                            a: background.w as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let mut pass = pass.forget_lifetime();
            pass.set_bind_group(2, self.oit.bind_group(), &[]);

            let mut frame = Frame {
                pass,
                ctx: &self.ctx,
                skin: &mut self.skin,
                meshes: &mut self.meshes,
                textures: &mut self.textures,
                uniforms: &mut self.uniforms,
                pipelines: &mut self.pipelines,
                camera: self.camera,
                settings: self.settings,
                settings_offset,
                wireframe_mode: self.wireframe_mode,
                active_textures: None,
            };
            draw(&mut frame);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.output_depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &self.composite_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.ctx.queue().submit(std::iter::once(encoder.finish()));
        drop(guard);

        if !self.overlays.is_empty() {
            let mut encoder =
                self.ctx
                    .device()
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Overlay Encoder"),
                    });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Overlay Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: output,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.targets.output_depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.overlays.render_all(&self.ctx, &mut pass);
            }
            self.ctx.queue().submit(std::iter::once(encoder.finish()));
        }
    }

    /// Resizes the viewport, reallocating all size-dependent resources.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.aspect = width as f32 / height.max(1) as f32;
        self.targets = RenderTargets::new(&self.ctx, width, height);
        self.oit
            .configure(&self.ctx, width, height, self.oit.node_budget_fraction());
        self.composite_bind_group =
            create_composite_bind_group(&self.ctx, &self.composite_layout, &self.targets, &self.oit);
        self.overlays.resize_all(&self.ctx, width, height);
    }

    /// Changes the fragment pool budget fraction, reallocating the pool.
    pub fn set_node_budget_fraction(&mut self, fraction: f32) {
        self.oit
            .configure(&self.ctx, self.targets.width, self.targets.height, fraction);
        self.composite_bind_group =
            create_composite_bind_group(&self.ctx, &self.composite_layout, &self.targets, &self.oit);
    }

    pub fn ctx(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings;
    }

    pub fn lights(&self) -> &[Light; LIGHT_COUNT] {
        &self.lights
    }

    pub fn set_light(&mut self, index: usize, light: Light) {
        self.lights[index] = light;
    }

    pub fn wireframe_mode(&self) -> WireframeMode {
        self.wireframe_mode
    }

    pub fn set_wireframe_mode(&mut self, mode: WireframeMode) {
        self.wireframe_mode = mode;
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Fragment pool capacity, for diagnostics.
    pub fn fragment_capacity(&self) -> u32 {
        self.oit.capacity()
    }

    pub fn is_mesh_buffered(&self, id: MeshId) -> bool {
        self.meshes.is_uploaded(id)
    }

    /// Releases a mesh's GPU buffers. Panics when the mesh was never
    /// buffered.
    pub fn release_mesh(&mut self, id: MeshId) {
        self.meshes.release(id);
    }

    /// Loads a texture set (or bumps its use count).
    pub fn load_textures(&mut self, set: &TextureSet) {
        self.textures.load(&self.ctx, set);
    }

    /// Drops one use of a texture set. Panics when the set is not loaded.
    pub fn unload_textures(&mut self, id: TextureSetId) {
        self.textures.unload(id);
    }

    /// Re-uploads the pixels of a loaded texture set.
    pub fn rebuffer_textures(&mut self, set: &TextureSet) {
        self.textures.rebuffer(&self.ctx, set);
    }

    pub fn add_overlay<O: Overlay + 'static>(&mut self, overlay: O) {
        self.overlays.add(overlay);
    }

    pub fn remove_overlay(&mut self, name: &str) -> Option<Box<dyn Overlay>> {
        self.overlays.remove(name)
    }

    /// Reads back the opaque depth target, row-major.
    pub fn read_opaque_depth(&self) -> Result<Vec<f32>, RendererError> {
        let bytes = self.read_target(&self.targets.depth, 4, wgpu::TextureAspect::DepthOnly)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Reads back the opaque color target, row-major.
    pub fn read_opaque_color(&self) -> Result<Vec<Color>, RendererError> {
        let bytes = self.read_target(&self.targets.color, 4, wgpu::TextureAspect::All)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Reads the fragment lists, ordered as the composite consumes them.
    pub fn read_fragment_lists(
        &self,
        depth_check: bool,
        sort: bool,
    ) -> Result<Vec<Vec<Node>>, RendererError> {
        let depth = if depth_check {
            Some(self.read_opaque_depth()?)
        } else {
            None
        };
        self.oit
            .read_node_lists(&self.ctx, depth.as_deref(), sort)
    }

    /// Resolves the current fragment lists on the CPU, reproducing the
    /// composite shader's output for verification and tooling.
    pub fn cpu_composite(&self) -> Result<CompositeImage, RendererError> {
        let lists = self.read_fragment_lists(true, true)?;
        let opaque = self.read_opaque_color()?;
        Ok(CompositeImage {
            width: self.targets.width,
            height: self.targets.height,
            pixels: crate::oit::resolve::composite_image(&lists, &opaque),
        })
    }

    fn read_target(
        &self,
        texture: &wgpu::Texture,
        bytes_per_pixel: u32,
        aspect: wgpu::TextureAspect,
    ) -> Result<Vec<u8>, RendererError> {
        let width = self.targets.width;
        let height = self.targets.height;
        let unpadded = width * bytes_per_pixel;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.ctx.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Target Readback Buffer"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.ctx
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Target Readback Encoder"),
                });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.ctx.device().poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| RendererError::Readback("map callback lost".into()))?
            .map_err(|e| RendererError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in 0..height {
            let start = (row * padded) as usize;
            pixels.extend_from_slice(&data[start..start + unpadded as usize]);
        }
        drop(data);
        staging.unmap();
        Ok(pixels)
    }
}

fn create_composite_layout(ctx: &RenderContext) -> wgpu::BindGroupLayout {
    let storage = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Composite Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            storage(2),
            storage(3),
            storage(4),
        ],
    })
}

fn create_composite_bind_group(
    ctx: &RenderContext,
    layout: &wgpu::BindGroupLayout,
    targets: &RenderTargets,
    oit: &OitBuffer,
) -> wgpu::BindGroup {
    ctx.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Composite Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.color_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.depth_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: oit.heads_buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: oit.counts_buffer().as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: oit.nodes_buffer().as_entire_binding(),
            },
        ],
    })
}
