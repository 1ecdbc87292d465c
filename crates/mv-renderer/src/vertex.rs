//! GPU vertex record shapes.
//!
//! A mesh is uploaded in one of four interleaved record shapes, depending on
//! whether its vertex range carries normals and whether its corners carry
//! colors. The shape is decided on first upload and never changes for that
//! mesh. Field order within a record is a wire contract with the vertex
//! shaders: position, normal, color, uv, weight.

use bytemuck::{Pod, Zeroable};
use mv_core::Corner;

use crate::skin::CachedVertex;

/// The four record shapes, keyed by layout booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// position + uv + weight
    Plain,
    /// position + normal + uv + weight
    Normal,
    /// position + color + uv + weight
    Color,
    /// position + normal + color + uv + weight
    NormalColor,
}

impl RecordKind {
    pub fn from_flags(has_normals: bool, has_colors: bool) -> Self {
        match (has_normals, has_colors) {
            (false, false) => RecordKind::Plain,
            (true, false) => RecordKind::Normal,
            (false, true) => RecordKind::Color,
            (true, true) => RecordKind::NormalColor,
        }
    }

    pub fn has_normals(self) -> bool {
        matches!(self, RecordKind::Normal | RecordKind::NormalColor)
    }

    pub fn has_colors(self) -> bool {
        matches!(self, RecordKind::Color | RecordKind::NormalColor)
    }

    /// Index usable for per-kind pipeline arrays.
    pub fn index(self) -> usize {
        match self {
            RecordKind::Plain => 0,
            RecordKind::Normal => 1,
            RecordKind::Color => 2,
            RecordKind::NormalColor => 3,
        }
    }

    /// All kinds, in `index()` order.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Plain,
        RecordKind::Normal,
        RecordKind::Color,
        RecordKind::NormalColor,
    ];

    /// Vertex shader entry point consuming this record shape.
    pub fn vs_entry_point(self) -> &'static str {
        match self {
            RecordKind::Plain => "vs_plain",
            RecordKind::Normal => "vs_normal",
            RecordKind::Color => "vs_color",
            RecordKind::NormalColor => "vs_normal_color",
        }
    }

    pub fn stride(self) -> u64 {
        match self {
            RecordKind::Plain => size_of::<GpuVertex>() as u64,
            RecordKind::Normal => size_of::<GpuVertexN>() as u64,
            RecordKind::Color => size_of::<GpuVertexC>() as u64,
            RecordKind::NormalColor => size_of::<GpuVertexNC>() as u64,
        }
    }

    /// Full vertex buffer layout for surface pipelines.
    pub fn vertex_layout(self) -> wgpu::VertexBufferLayout<'static> {
        const PLAIN: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 3 => Float32x2, 4 => Float32];
        const NORMAL: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            0 => Float32x3, 1 => Float32x3, 3 => Float32x2, 4 => Float32
        ];
        const COLOR: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            0 => Float32x3, 2 => Unorm8x4, 3 => Float32x2, 4 => Float32
        ];
        const NORMAL_COLOR: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            0 => Float32x3, 1 => Float32x3, 2 => Unorm8x4, 3 => Float32x2, 4 => Float32
        ];

        let attributes: &'static [wgpu::VertexAttribute] = match self {
            RecordKind::Plain => &PLAIN,
            RecordKind::Normal => &NORMAL,
            RecordKind::Color => &COLOR,
            RecordKind::NormalColor => &NORMAL_COLOR,
        };
        wgpu::VertexBufferLayout {
            array_stride: self.stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }

    /// Position-only layout with this kind's stride, for wireframe redraws
    /// over the same vertex buffer.
    pub fn position_layout(self) -> wgpu::VertexBufferLayout<'static> {
        const POSITION: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: self.stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION,
        }
    }
}

fn resolved_position(vertex: &CachedVertex) -> [f32; 3] {
    let position = vertex.position.truncate();
    if vertex.sum_weight != 1.0 {
        (position / vertex.sum_weight).to_array()
    } else {
        position.to_array()
    }
}

fn resolved_normal(vertex: &CachedVertex) -> [f32; 3] {
    if vertex.sum_weight != 1.0 {
        (vertex.normal / vertex.sum_weight).to_array()
    } else {
        vertex.normal.to_array()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub weight: f32,
}

impl GpuVertex {
    pub fn new(vertex: &CachedVertex, corner: &Corner) -> Self {
        Self {
            position: resolved_position(vertex),
            uv: corner.uv.to_array(),
            weight: vertex.display_weight,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertexN {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub weight: f32,
}

impl GpuVertexN {
    pub fn new(vertex: &CachedVertex, corner: &Corner) -> Self {
        Self {
            position: resolved_position(vertex),
            normal: resolved_normal(vertex),
            uv: corner.uv.to_array(),
            weight: vertex.display_weight,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertexC {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
    pub weight: f32,
}

impl GpuVertexC {
    pub fn new(vertex: &CachedVertex, corner: &Corner) -> Self {
        Self {
            position: resolved_position(vertex),
            color: [
                corner.color.r,
                corner.color.g,
                corner.color.b,
                corner.color.a,
            ],
            uv: corner.uv.to_array(),
            weight: vertex.display_weight,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertexNC {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
    pub weight: f32,
}

impl GpuVertexNC {
    pub fn new(vertex: &CachedVertex, corner: &Corner) -> Self {
        Self {
            position: resolved_position(vertex),
            normal: resolved_normal(vertex),
            color: [
                corner.color.r,
                corner.color.g,
                corner.color.b,
                corner.color.a,
            ],
            uv: corner.uv.to_array(),
            weight: vertex.display_weight,
        }
    }
}

/// Emitted vertex data for one mesh, in one of the four record shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexRecords {
    Plain(Vec<GpuVertex>),
    Normal(Vec<GpuVertexN>),
    Color(Vec<GpuVertexC>),
    NormalColor(Vec<GpuVertexNC>),
}

impl VertexRecords {
    /// Emits records of the given shape for each corner, reading resolved
    /// vertices from the cache slice at `read_offset`.
    pub fn build(
        kind: RecordKind,
        cache: &[CachedVertex],
        corners: &[Corner],
        read_offset: u16,
    ) -> Self {
        let resolve = |corner: &Corner| &cache[corner.vertex_index as usize + read_offset as usize];
        match kind {
            RecordKind::Plain => VertexRecords::Plain(
                corners
                    .iter()
                    .map(|c| GpuVertex::new(resolve(c), c))
                    .collect(),
            ),
            RecordKind::Normal => VertexRecords::Normal(
                corners
                    .iter()
                    .map(|c| GpuVertexN::new(resolve(c), c))
                    .collect(),
            ),
            RecordKind::Color => VertexRecords::Color(
                corners
                    .iter()
                    .map(|c| GpuVertexC::new(resolve(c), c))
                    .collect(),
            ),
            RecordKind::NormalColor => VertexRecords::NormalColor(
                corners
                    .iter()
                    .map(|c| GpuVertexNC::new(resolve(c), c))
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            VertexRecords::Plain(_) => RecordKind::Plain,
            VertexRecords::Normal(_) => RecordKind::Normal,
            VertexRecords::Color(_) => RecordKind::Color,
            VertexRecords::NormalColor(_) => RecordKind::NormalColor,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VertexRecords::Plain(v) => v.len(),
            VertexRecords::Normal(v) => v.len(),
            VertexRecords::Color(v) => v.len(),
            VertexRecords::NormalColor(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw interleaved vertex bytes for upload.
    pub fn bytes(&self) -> &[u8] {
        match self {
            VertexRecords::Plain(v) => bytemuck::cast_slice(v),
            VertexRecords::Normal(v) => bytemuck::cast_slice(v),
            VertexRecords::Color(v) => bytemuck::cast_slice(v),
            VertexRecords::NormalColor(v) => bytemuck::cast_slice(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3, Vec4};
    use mv_core::Color;

    #[test]
    fn record_sizes_match_interleaved_layout() {
        assert_eq!(size_of::<GpuVertex>(), 24);
        assert_eq!(size_of::<GpuVertexN>(), 36);
        assert_eq!(size_of::<GpuVertexC>(), 28);
        assert_eq!(size_of::<GpuVertexNC>(), 40);
        for kind in RecordKind::ALL {
            assert_eq!(kind.vertex_layout().array_stride, kind.stride());
        }
    }

    #[test]
    fn full_weight_skips_division() {
        let vertex = CachedVertex {
            position: Vec4::new(3.0, 6.0, 9.0, 1.0),
            normal: Vec3::new(0.0, 1.0, 0.0),
            display_weight: 0.25,
            sum_weight: 1.0,
        };
        let corner = Corner::new(0, Vec2::new(0.5, 0.5), Color::WHITE);

        let record = GpuVertexN::new(&vertex, &corner);
        assert_eq!(record.position, [3.0, 6.0, 9.0]);
        assert_eq!(record.normal, [0.0, 1.0, 0.0]);
        assert_eq!(record.weight, 0.25);
    }

    #[test]
    fn partial_weight_divides_position_and_normal() {
        let vertex = CachedVertex {
            position: Vec4::new(1.0, 2.0, 3.0, 0.5),
            normal: Vec3::new(0.0, 0.5, 0.0),
            display_weight: 0.0,
            sum_weight: 0.5,
        };
        let corner = Corner::new(0, Vec2::ZERO, Color::WHITE);

        let record = GpuVertexN::new(&vertex, &corner);
        assert_eq!(record.position, [2.0, 4.0, 6.0]);
        assert_eq!(record.normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn build_reads_through_read_offset() {
        let mut cache = vec![CachedVertex::default(); 4];
        cache[2] = CachedVertex {
            position: Vec4::new(5.0, 0.0, 0.0, 1.0),
            normal: Vec3::Y,
            display_weight: 0.0,
            sum_weight: 1.0,
        };
        let corners = [Corner::new(0, Vec2::ZERO, Color::WHITE)];

        let records = VertexRecords::build(RecordKind::Plain, &cache, &corners, 2);
        assert_eq!(records.len(), 1);
        match records {
            VertexRecords::Plain(v) => assert_eq!(v[0].position, [5.0, 0.0, 0.0]),
            _ => unreachable!(),
        }
    }
}
