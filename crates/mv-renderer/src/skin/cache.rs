//! Vertex cache accumulating weighted bone contributions.
//!
//! Skinned models arrive bone by bone: every bone contributes its weighted
//! share of each vertex it influences, transformed by that bone's world
//! matrix. The cache accumulates those shares per vertex slot across
//! batches, and resolves them into renderable vertex records when a batch's
//! corner data reads a range back out.

use glam::{Mat3, Mat4, Vec3, Vec4};
use mv_core::{DEFAULT_NORMAL, MeshBatch, MeshVertex};

use crate::context::RenderContext;
use crate::resources::MeshBufferTable;
use crate::skin::region::RegionMarker;
use crate::vertex::{RecordKind, VertexRecords};

/// One vertex cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CachedVertex {
    /// Accumulated position; w carries the accumulated weight-scaled mass.
    pub position: Vec4,
    /// Accumulated normal.
    pub normal: Vec3,
    /// Last bone weight written while the owning node was highlighted.
    /// Visualization data only.
    pub display_weight: f32,
    /// Accumulated bone weight. 1.0 for a fully weighted vertex; may be
    /// less while a weight chain is still being processed.
    pub sum_weight: f32,
}

impl CachedVertex {
    fn rigid(vertex: &MeshVertex) -> Self {
        Self {
            position: vertex.position.extend(1.0),
            normal: vertex.normal,
            display_weight: 0.0,
            sum_weight: 1.0,
        }
    }

    fn weighted(position: Vec4, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            display_weight: 0.0,
            sum_weight: 0.0,
        }
    }
}

/// Vertex skin cache.
///
/// The slot arena grows on demand and is reused across frames; slot contents
/// are only meaningful between a frame's vertex writes and the emissions
/// reading them.
#[derive(Default)]
pub struct SkinCache {
    vertices: Vec<CachedVertex>,
    normal_regions: RegionMarker,
}

impl SkinCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes and emits a list of batches.
    ///
    /// `skin_world` is the world matrix of the bone these batches belong
    /// to; without it vertices are copied verbatim (rigid mesh fast path).
    /// `active` marks the bone as highlighted, updating the per-vertex
    /// display weight.
    pub fn buffer_meshes(
        &mut self,
        ctx: &RenderContext,
        table: &mut MeshBufferTable,
        batches: &[MeshBatch],
        skin_world: Option<Mat4>,
        active: bool,
    ) {
        for batch in batches {
            self.accumulate_batch(batch, skin_world, active);
            let existing = table
                .is_uploaded(batch.id)
                .then(|| table.get(batch.id).kind());
            if let Some(records) = self.emit_records(batch, existing) {
                table.upload(ctx, batch, &records);
            }
        }
    }

    /// Writes one batch's vertex payload into the cache.
    pub fn accumulate_batch(&mut self, batch: &MeshBatch, skin_world: Option<Mat4>, active: bool) {
        let Some(vertices) = &batch.vertices else {
            return;
        };

        let mut from = u32::MAX;
        let mut to = 0u32;
        let offset = batch.vertex_write_offset as u32;

        match skin_world {
            None => {
                for vertex in vertices {
                    let index = vertex.index as u32 + offset;
                    from = from.min(index);
                    to = to.max(index);
                    self.ensure_len(index as usize + 1);
                    self.vertices[index as usize] = CachedVertex::rigid(vertex);
                }
            }
            Some(world) => {
                let normal_matrix = Mat3::from_mat4(world.inverse().transpose());
                for vertex in vertices {
                    let position = world * vertex.position.extend(1.0) * vertex.weight;
                    let normal = if batch.has_normals {
                        normal_matrix * vertex.normal * vertex.weight
                    } else {
                        DEFAULT_NORMAL
                    };

                    let index = vertex.index as u32 + offset;
                    from = from.min(index);
                    to = to.max(index);
                    self.ensure_len(index as usize + 1);

                    let slot = &mut self.vertices[index as usize];
                    if batch.continue_weight {
                        slot.position += position;
                        if batch.has_normals {
                            slot.normal += normal;
                        }
                    } else {
                        *slot = CachedVertex::weighted(position, normal);
                    }
                    slot.sum_weight += vertex.weight;
                    if active {
                        slot.display_weight = vertex.weight;
                    }
                }
            }
        }

        // A batch continuing a weight chain without normal data of its own
        // must not erase the normal presence an earlier batch recorded.
        if !batch.continue_weight || batch.has_normals {
            self.normal_regions
                .mark(from, to.wrapping_add(1), batch.has_normals);
        }
    }

    /// Resolves one batch's corner data into vertex records.
    ///
    /// `existing` is the record kind the mesh was first uploaded with, if
    /// any; the layout never changes once decided. Returns `None` for
    /// batches without corner data.
    pub fn emit_records(
        &mut self,
        batch: &MeshBatch,
        existing: Option<RecordKind>,
    ) -> Option<VertexRecords> {
        let corners = batch.corners.as_ref()?;
        if corners.is_empty() {
            return None;
        }

        let max_corner_index = corners
            .iter()
            .map(|corner| corner.vertex_index)
            .max()
            .unwrap_or(0) as u32;

        let kind = match existing {
            Some(kind) => kind,
            None => {
                let has_colors = batch.has_colors;
                let mut has_normals = batch.vertices.is_some() && batch.has_normals;
                if !has_normals {
                    // The read range may have been written by another batch;
                    // inherit its normal presence.
                    let from = batch.vertex_read_offset as u32;
                    let to = from + max_corner_index + 1;
                    has_normals = self.normal_regions.any(from, to, true);
                }
                RecordKind::from_flags(has_normals, has_colors)
            }
        };

        let max_read = batch.vertex_read_offset as usize + max_corner_index as usize + 1;
        self.ensure_len(max_read);
        Some(VertexRecords::build(
            kind,
            &self.vertices,
            corners,
            batch.vertex_read_offset,
        ))
    }

    /// Read access to a cache slot, for tests and tooling.
    pub fn slot(&self, index: usize) -> Option<&CachedVertex> {
        self.vertices.get(index)
    }

    fn ensure_len(&mut self, len: usize) {
        if self.vertices.len() < len {
            self.vertices.resize(len, CachedVertex::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec2;
    use mv_core::{Color, Corner, MeshId};

    fn corner_batch(id: u64, corners: Vec<Corner>) -> MeshBatch {
        let mut batch = MeshBatch::new(MeshId(id));
        batch.corners = Some(corners);
        batch
    }

    fn skin_batch(id: u64, vertices: Vec<MeshVertex>, continue_weight: bool) -> MeshBatch {
        let mut batch = MeshBatch::new(MeshId(id));
        batch.vertices = Some(vertices);
        batch.continue_weight = continue_weight;
        batch
    }

    #[test]
    fn rigid_batch_copies_verbatim() {
        let mut cache = SkinCache::new();
        let batch = skin_batch(
            1,
            vec![MeshVertex::new(0, Vec3::new(1.0, 2.0, 3.0), Vec3::X, 1.0)],
            false,
        );
        cache.accumulate_batch(&batch, None, false);

        let slot = cache.slot(0).unwrap();
        assert_eq!(slot.position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(slot.normal, Vec3::X);
        assert_eq!(slot.sum_weight, 1.0);
    }

    #[test]
    fn two_bone_chain_averages_by_weight() {
        let mut cache = SkinCache::new();
        let position = Vec3::ZERO;

        let first = skin_batch(1, vec![MeshVertex::new(0, position, Vec3::Y, 0.3)], false);
        cache.accumulate_batch(&first, Some(Mat4::from_translation(Vec3::X)), false);

        let second = skin_batch(1, vec![MeshVertex::new(0, position, Vec3::Y, 0.7)], true);
        cache.accumulate_batch(&second, Some(Mat4::from_translation(Vec3::X * 3.0)), false);

        let slot = cache.slot(0).unwrap();
        // 0.3 and 0.7 sum to exactly 1.0 in f32, so emission must take the
        // division-skipping path and still produce the weighted average.
        assert_eq!(slot.sum_weight, 1.0);
        assert_relative_eq!(slot.position.x, 0.3 + 0.7 * 3.0, epsilon = 1e-6);

        let mut reader = corner_batch(1, vec![Corner::new(0, Vec2::ZERO, Color::WHITE)]);
        reader.has_colors = false;
        let records = cache.emit_records(&reader, None).unwrap();
        match records {
            VertexRecords::Normal(v) => {
                assert_relative_eq!(v[0].position[0], 2.4, epsilon = 1e-6);
                assert_relative_eq!(v[0].normal[1], 1.0, epsilon = 1e-6);
            }
            other => panic!("unexpected record kind {:?}", other.kind()),
        }
    }

    #[test]
    fn partial_weight_sum_divides_on_emission() {
        let mut cache = SkinCache::new();
        let first = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.25)], false);
        cache.accumulate_batch(&first, Some(Mat4::from_translation(Vec3::X)), false);

        let second = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.7)], true);
        cache.accumulate_batch(&second, Some(Mat4::from_translation(Vec3::X * 3.0)), false);

        let slot = cache.slot(0).unwrap();
        assert_relative_eq!(slot.sum_weight, 0.95, epsilon = 1e-6);

        let reader = corner_batch(1, vec![Corner::new(0, Vec2::ZERO, Color::WHITE)]);
        let records = cache.emit_records(&reader, None).unwrap();
        match records {
            VertexRecords::Normal(v) => {
                let expected = (0.25 + 0.7 * 3.0) / 0.95;
                assert_relative_eq!(v[0].position[0], expected, epsilon = 1e-6);
            }
            other => panic!("unexpected record kind {:?}", other.kind()),
        }
    }

    #[test]
    fn display_weight_tracks_highlighted_bone_only() {
        let mut cache = SkinCache::new();
        let first = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.3)], false);
        cache.accumulate_batch(&first, Some(Mat4::IDENTITY), false);
        assert_eq!(cache.slot(0).unwrap().display_weight, 0.0);

        let second = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.7)], true);
        cache.accumulate_batch(&second, Some(Mat4::IDENTITY), true);
        assert_eq!(cache.slot(0).unwrap().display_weight, 0.7);
    }

    #[test]
    fn continuation_without_normals_keeps_region_presence() {
        let mut cache = SkinCache::new();

        let mut first = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.5)], false);
        first.has_normals = true;
        cache.accumulate_batch(&first, Some(Mat4::IDENTITY), false);

        let mut second = skin_batch(2, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 0.5)], true);
        second.has_normals = false;
        cache.accumulate_batch(&second, Some(Mat4::IDENTITY), false);

        // A reader without vertex payload of its own inherits the chain's
        // normal presence.
        let reader = corner_batch(3, vec![Corner::new(0, Vec2::ZERO, Color::WHITE)]);
        let records = cache.emit_records(&reader, None).unwrap();
        assert_eq!(records.kind(), RecordKind::Normal);
    }

    #[test]
    fn fresh_chain_without_normals_clears_region_presence() {
        let mut cache = SkinCache::new();

        let mut first = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 1.0)], false);
        first.has_normals = true;
        cache.accumulate_batch(&first, Some(Mat4::IDENTITY), false);

        let mut second = skin_batch(2, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 1.0)], false);
        second.has_normals = false;
        cache.accumulate_batch(&second, Some(Mat4::IDENTITY), false);

        let reader = corner_batch(3, vec![Corner::new(0, Vec2::ZERO, Color::WHITE)]);
        let records = cache.emit_records(&reader, None).unwrap();
        assert_eq!(records.kind(), RecordKind::Plain);
    }

    #[test]
    fn emission_without_corners_is_no_op() {
        let mut cache = SkinCache::new();
        let batch = MeshBatch::new(MeshId(1));
        assert!(cache.emit_records(&batch, None).is_none());
    }

    #[test]
    fn existing_layout_wins_over_batch_flags() {
        let mut cache = SkinCache::new();
        let batch = skin_batch(1, vec![MeshVertex::new(0, Vec3::ZERO, Vec3::Y, 1.0)], false);
        cache.accumulate_batch(&batch, None, false);

        let mut reader = corner_batch(1, vec![Corner::new(0, Vec2::ZERO, Color::WHITE)]);
        reader.has_colors = true;
        let records = cache
            .emit_records(&reader, Some(RecordKind::Plain))
            .unwrap();
        assert_eq!(records.kind(), RecordKind::Plain);
    }
}
