//! Per-frame draw context.

use glam::Mat4;
use mv_core::{MeshBatch, ModelNode, TextureSetId};

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::matrices::RenderMatrices;
use crate::renderer::pipelines::SurfacePipelines;
use crate::resources::{MeshBufferTable, TextureTable};
use crate::settings::{RenderSettings, WireframeMode};
use crate::skin::SkinCache;
use crate::uniforms::{FrameUniforms, MatrixUniforms, SettingsUniforms, SurfaceUniforms};

/// Draw interface handed to the render callback.
///
/// Lives for the 3D pass of one frame; mesh draws recorded here land on the
/// opaque target, with transparent fragments diverted into the fragment
/// lists by the surface shader.
pub struct Frame<'r> {
    pub(super) pass: wgpu::RenderPass<'static>,
    pub(super) ctx: &'r RenderContext,
    pub(super) skin: &'r mut SkinCache,
    pub(super) meshes: &'r mut MeshBufferTable,
    pub(super) textures: &'r mut TextureTable,
    pub(super) uniforms: &'r mut FrameUniforms,
    pub(super) pipelines: &'r mut SurfacePipelines,
    pub(super) camera: Camera,
    pub(super) settings: RenderSettings,
    pub(super) settings_offset: u32,
    pub(super) wireframe_mode: WireframeMode,
    pub(super) active_textures: Option<TextureSetId>,
}

impl Frame<'_> {
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    /// Changes the render settings mid-frame; draws recorded afterwards use
    /// the new values.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        if settings != self.settings {
            self.settings = settings;
            self.settings_offset = self
                .uniforms
                .push_settings(self.ctx, &SettingsUniforms::from(&settings));
        }
    }

    /// Selects the texture set materials resolve their texture indices in.
    /// The set must currently be loaded for textures to appear; otherwise
    /// draws fall back to untextured rendering.
    pub fn set_active_textures(&mut self, set: Option<TextureSetId>) {
        self.active_textures = set;
    }

    pub fn active_textures(&self) -> Option<TextureSetId> {
        self.active_textures
    }

    /// Runs the skin cache over a list of batches and uploads the results.
    ///
    /// `skin_world` is the owning bone's world matrix; `None` copies
    /// vertices verbatim. `active` marks the bone as highlighted for
    /// weight visualization.
    pub fn buffer_meshes(&mut self, batches: &[MeshBatch], skin_world: Option<Mat4>, active: bool) {
        self.skin
            .buffer_meshes(self.ctx, self.meshes, batches, skin_world, active);
    }

    /// Draws already-buffered meshes, once per matrix set.
    ///
    /// Batches without corner data are skipped; drawing a batch that was
    /// never buffered is a caller bug and panics.
    pub fn draw_meshes(&mut self, batches: &[MeshBatch], matrices: &[RenderMatrices]) {
        for batch in batches {
            if batch.corners.is_none() {
                continue;
            }
            self.draw_mesh(batch, matrices);
        }
    }

    fn draw_mesh(&mut self, batch: &MeshBatch, matrices: &[RenderMatrices]) {
        let material = &batch.material;
        let handle = self.meshes.get(batch.id);
        let kind = handle.kind();
        let topology = handle.topology();
        let draw_count = handle.draw_count();
        let indexed = handle.is_indexed();

        let texture_available = material.use_texture
            && self
                .active_textures
                .is_some_and(|id| (material.texture_index as usize) < self.textures.texture_count(id));

        let surface_block = SurfaceUniforms::build(
            material,
            &self.settings,
            handle.has_normals(),
            handle.has_colors(),
            texture_available,
        );
        let surface_offset = self.uniforms.push_surface(self.ctx, &surface_block);

        let polygon_mode = match self.wireframe_mode {
            WireframeMode::ReplaceLine => wgpu::PolygonMode::Line,
            WireframeMode::ReplacePoint => wgpu::PolygonMode::Point,
            WireframeMode::None | WireframeMode::Overlay => wgpu::PolygonMode::Fill,
        };
        let cull = material.backface_culling && !self.settings.disable_backface_culling;
        let pipeline = self
            .pipelines
            .surface(self.ctx, kind, topology, polygon_mode, cull);

        let texture_bind_group = self
            .textures
            .bind_group(self.ctx, self.active_textures, material);

        let handle = self.meshes.get(batch.id);
        self.pass.set_pipeline(&pipeline);
        self.pass.set_bind_group(1, &texture_bind_group, &[]);
        self.pass
            .set_vertex_buffer(0, handle.vertex_buffer().slice(..));
        if let Some(index_buffer) = handle.index_buffer() {
            self.pass
                .set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        }

        for matrix_set in matrices {
            let matrix_offset = self
                .uniforms
                .push_matrices(self.ctx, &MatrixUniforms::from(matrix_set));
            let offsets = [matrix_offset, self.settings_offset, surface_offset];
            self.pass
                .set_bind_group(0, self.uniforms.bind_group(), &offsets);

            if indexed {
                self.pass.draw_indexed(0..draw_count, 0, 0..1);
            } else {
                self.pass.draw(0..draw_count, 0..1);
            }

            if self.wireframe_mode == WireframeMode::Overlay {
                let wire = self.pipelines.wireframe_overlay(self.ctx, kind, topology);
                self.pass.set_pipeline(&wire);
                if indexed {
                    self.pass.draw_indexed(0..draw_count, 0, 0..1);
                } else {
                    self.pass.draw(0..draw_count, 0..1);
                }
                self.pass.set_pipeline(&pipeline);
            }
        }
    }

    /// Draws a model hierarchy, re-skinning weighted trees.
    ///
    /// `active` is the id of the highlighted node, if any; its bone weights
    /// feed the weight visualization channel.
    pub fn draw_model(&mut self, node: &ModelNode, active: Option<u64>) {
        let weighted = node.has_weighted_meshes();
        self.draw_model_node(node, active, None, None, weighted);
    }

    fn draw_model_node(
        &mut self,
        node: &ModelNode,
        active: Option<u64>,
        parent_world: Option<Mat4>,
        weight_root: Option<Mat4>,
        weighted: bool,
    ) {
        let mut world = node.local_matrix;
        let mut weight_root = weight_root;

        if let Some(parent) = parent_world {
            world = parent * world;
        } else if weighted {
            // Weighted vertices are skinned into the space of the tree
            // root; the node world collapses to identity and the root
            // transform is applied at draw time instead.
            weight_root = Some(world);
            world = Mat4::IDENTITY;
        }

        if !node.meshes.is_empty() {
            if weighted {
                self.buffer_meshes(&node.meshes, Some(world), active == Some(node.id));
            } else if !self.meshes.is_uploaded(node.meshes[0].id) {
                self.buffer_meshes(&node.meshes, None, false);
            }

            if !node.skip_draw {
                let draw_world = weight_root.unwrap_or(world);
                let matrices =
                    RenderMatrices::new(draw_world, self.camera.mvp_matrix(draw_world));
                self.draw_meshes(&node.meshes, &[matrices]);
            }
        }

        for child in &node.children {
            self.draw_model_node(child, active, Some(world), weight_root, weighted);
        }
    }
}
