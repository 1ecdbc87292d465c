//! Surface pipeline cache.
//!
//! Mesh draws vary over record kind, topology, rasterization mode and
//! culling; pipelines are built lazily per combination and cached for the
//! renderer's lifetime.

use std::collections::HashMap;

use crate::context::RenderContext;
use crate::error::{RendererError, ShaderStage};
use crate::pipeline::PipelineConfig;
use crate::vertex::RecordKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SurfaceKey {
    kind: RecordKind,
    topology: wgpu::PrimitiveTopology,
    polygon_mode: wgpu::PolygonMode,
    cull: bool,
}

/// Cache of mesh surface and wireframe pipelines.
pub struct SurfacePipelines {
    surface_shader: wgpu::ShaderModule,
    wireframe_shader: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    oit_layout: wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    line_mode: bool,
    point_mode: bool,
    surface: HashMap<SurfaceKey, wgpu::RenderPipeline>,
    wireframe: HashMap<(RecordKind, wgpu::PrimitiveTopology), wgpu::RenderPipeline>,
}

impl SurfacePipelines {
    pub fn new(
        ctx: &RenderContext,
        uniform_layout: wgpu::BindGroupLayout,
        texture_layout: wgpu::BindGroupLayout,
        oit_layout: wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, RendererError> {
        let surface_shader = ctx.create_shader_checked(
            include_str!("../shaders/surface.wgsl"),
            "surface",
            ShaderStage::Fragment,
        )?;
        let wireframe_shader = ctx.create_shader_checked(
            include_str!("../shaders/wireframe.wgsl"),
            "wireframe",
            ShaderStage::Vertex,
        )?;

        let features = ctx.device().features();
        let line_mode = features.contains(wgpu::Features::POLYGON_MODE_LINE);
        let point_mode = features.contains(wgpu::Features::POLYGON_MODE_POINT);
        if !line_mode || !point_mode {
            tracing::warn!(
                "polygon mode features unavailable; wireframe modes fall back to filled rendering"
            );
        }

        Ok(Self {
            surface_shader,
            wireframe_shader,
            uniform_layout,
            texture_layout,
            oit_layout,
            color_format,
            depth_format: ctx.depth_format(),
            line_mode,
            point_mode,
            surface: HashMap::new(),
            wireframe: HashMap::new(),
        })
    }

    fn clamp_polygon_mode(&self, mode: wgpu::PolygonMode) -> wgpu::PolygonMode {
        match mode {
            wgpu::PolygonMode::Line if !self.line_mode => wgpu::PolygonMode::Fill,
            wgpu::PolygonMode::Point if !self.point_mode => wgpu::PolygonMode::Fill,
            mode => mode,
        }
    }

    /// Returns the surface pipeline for one draw state.
    pub fn surface(
        &mut self,
        ctx: &RenderContext,
        kind: RecordKind,
        topology: wgpu::PrimitiveTopology,
        polygon_mode: wgpu::PolygonMode,
        cull: bool,
    ) -> wgpu::RenderPipeline {
        let key = SurfaceKey {
            kind,
            topology,
            polygon_mode: self.clamp_polygon_mode(polygon_mode),
            cull,
        };
        if let Some(pipeline) = self.surface.get(&key) {
            return pipeline.clone();
        }

        let pipeline = PipelineConfig::new(
            "Surface",
            self.color_format,
            &[&self.uniform_layout, &self.texture_layout, &self.oit_layout],
        )
        .with_depth(self.depth_format)
        .with_vertex_layouts(vec![key.kind.vertex_layout()])
        .with_topology(key.topology)
        .with_polygon_mode(key.polygon_mode)
        .with_cull_mode(key.cull.then_some(wgpu::Face::Back))
        .with_entry_points(key.kind.vs_entry_point(), "fs_main")
        .build(ctx.device(), &self.surface_shader);

        self.surface.insert(key, pipeline.clone());
        pipeline
    }

    /// Returns the line pipeline redrawing a mesh for wireframe overlays.
    pub fn wireframe_overlay(
        &mut self,
        ctx: &RenderContext,
        kind: RecordKind,
        topology: wgpu::PrimitiveTopology,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.wireframe.get(&(kind, topology)) {
            return pipeline.clone();
        }

        // Same bind group layouts as the surface pipelines, so the dynamic
        // offsets of the triggering draw stay bound across the redraw.
        let pipeline = PipelineConfig::new(
            "Wireframe Overlay",
            self.color_format,
            &[&self.uniform_layout, &self.texture_layout, &self.oit_layout],
        )
        .with_depth(self.depth_format)
        .with_depth_state(false, wgpu::CompareFunction::LessEqual)
        .with_vertex_layouts(vec![kind.position_layout()])
        .with_topology(topology)
        .with_polygon_mode(self.clamp_polygon_mode(wgpu::PolygonMode::Line))
        .build(ctx.device(), &self.wireframe_shader);

        self.wireframe.insert((kind, topology), pipeline.clone());
        pipeline
    }
}
