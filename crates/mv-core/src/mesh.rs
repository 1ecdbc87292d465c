//! Mesh batch data model.
//!
//! A drawable surface arrives as a list of [`MeshBatch`]es. Batches play two
//! roles that may be split across list entries: they *write* vertices into
//! the renderer's vertex cache (optionally as an additional bone's weighted
//! contribution to vertices written earlier), and they *read* a vertex range
//! back out through their corner list to form triangles. The write/read
//! offset pair is what lets one batch's corners reference vertices another
//! batch produced.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::material::Material;

/// Caller-stable identity of a mesh batch.
///
/// GPU resources are keyed by this id; re-using an id refers to the same
/// GPU buffers, so ids must be unique per distinct mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshId(pub u64);

impl std::fmt::Display for MeshId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Fallback normal for vertices written without normal data.
pub const DEFAULT_NORMAL: Vec3 = Vec3::Y;

/// One vertex as supplied by scene traversal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    /// Cache slot this vertex writes to, relative to the batch write offset.
    pub index: u16,
    pub position: Vec3,
    pub normal: Vec3,
    /// Bone influence of this contribution, 0 to 1.
    pub weight: f32,
}

impl MeshVertex {
    pub fn new(index: u16, position: Vec3, normal: Vec3, weight: f32) -> Self {
        Self {
            index,
            position,
            normal,
            weight,
        }
    }

    /// A rigid vertex with full weight and the fallback normal.
    pub fn rigid(index: u16, position: Vec3) -> Self {
        Self::new(index, position, DEFAULT_NORMAL, 1.0)
    }
}

/// One polygon corner: a vertex reference plus per-corner surface data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    /// Cache slot to read, relative to the batch read offset.
    pub vertex_index: u16,
    pub uv: Vec2,
    pub color: Color,
}

impl Corner {
    pub fn new(vertex_index: u16, uv: Vec2, color: Color) -> Self {
        Self {
            vertex_index,
            uv,
            color,
        }
    }
}

/// One mesh batch: vertex payload, polygon data, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshBatch {
    pub id: MeshId,
    pub material: Material,

    /// Vertices to write into the vertex cache. `None` for batches that
    /// only read back vertices written by an earlier batch.
    pub vertices: Option<Vec<MeshVertex>>,
    /// Polygon corners reading vertices out of the cache. `None` for
    /// batches that only contribute vertex data.
    pub corners: Option<Vec<Corner>>,
    /// Optional index list over the corner array.
    pub index_list: Option<Vec<u32>>,

    /// Corners form a triangle strip instead of a triangle list.
    pub strippified: bool,
    /// This batch adds another bone's contribution to already-written
    /// vertices instead of overwriting them.
    pub continue_weight: bool,
    /// Whether the vertex payload carries meaningful normals.
    pub has_normals: bool,
    /// Whether the corner colors are meaningful.
    pub has_colors: bool,

    pub vertex_write_offset: u16,
    pub vertex_read_offset: u16,
}

impl MeshBatch {
    /// Creates an empty batch with default material and offsets.
    pub fn new(id: MeshId) -> Self {
        Self {
            id,
            material: Material::default(),
            vertices: None,
            corners: None,
            index_list: None,
            strippified: false,
            continue_weight: false,
            has_normals: true,
            has_colors: false,
            vertex_write_offset: 0,
            vertex_read_offset: 0,
        }
    }

    /// Whether this batch takes part in a weighted vertex chain.
    pub fn is_weighted(&self) -> bool {
        self.continue_weight
            || self.vertex_write_offset != 0
            || self.vertex_read_offset != 0
            || self
                .vertices
                .as_ref()
                .is_some_and(|v| v.iter().any(|vtx| vtx.weight != 1.0))
    }

    /// Number of vertices a draw of this batch covers.
    pub fn draw_count(&self) -> u32 {
        match (&self.index_list, &self.corners) {
            (Some(indices), _) => indices.len() as u32,
            (None, Some(corners)) => corners.len() as u32,
            (None, None) => 0,
        }
    }
}

/// A node of a caller-supplied model hierarchy.
///
/// The renderer does not own a scene graph; this is the minimal shape the
/// model-tree draw helper traverses. A tree counts as weighted when any
/// batch in it is part of a weighted chain, in which case vertex positions
/// are skinned into the space of the tree root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    /// Caller-stable identity, used to match the highlighted node.
    pub id: u64,
    pub local_matrix: glam::Mat4,
    pub meshes: Vec<MeshBatch>,
    pub children: Vec<ModelNode>,
    /// Keep the node's meshes buffered but skip drawing them.
    pub skip_draw: bool,
}

impl ModelNode {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            local_matrix: glam::Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
            skip_draw: false,
        }
    }

    /// Whether any mesh in this subtree takes part in a weighted chain.
    pub fn has_weighted_meshes(&self) -> bool {
        self.meshes.iter().any(MeshBatch::is_weighted)
            || self.children.iter().any(ModelNode::has_weighted_meshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_count_prefers_index_list() {
        let mut batch = MeshBatch::new(MeshId(1));
        batch.corners = Some(vec![Corner::new(0, Vec2::ZERO, Color::WHITE); 3]);
        assert_eq!(batch.draw_count(), 3);

        batch.index_list = Some(vec![0, 1, 2, 2, 1, 0]);
        assert_eq!(batch.draw_count(), 6);
    }

    #[test]
    fn weighted_detection() {
        let mut batch = MeshBatch::new(MeshId(1));
        assert!(!batch.is_weighted());

        batch.vertices = Some(vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.5)]);
        assert!(batch.is_weighted());

        let mut chained = MeshBatch::new(MeshId(2));
        chained.continue_weight = true;
        assert!(chained.is_weighted());
    }

    #[test]
    fn weighted_detection_walks_tree() {
        let mut leaf = ModelNode::new(2);
        let mut batch = MeshBatch::new(MeshId(1));
        batch.vertex_write_offset = 16;
        leaf.meshes.push(batch);

        let mut root = ModelNode::new(1);
        assert!(!root.has_weighted_meshes());
        root.children.push(leaf);
        assert!(root.has_weighted_meshes());
    }
}
