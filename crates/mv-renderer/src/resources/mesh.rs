//! Mesh GPU buffer table.

use std::collections::HashMap;

use mv_core::{MeshBatch, MeshId};

use crate::context::RenderContext;
use crate::vertex::{RecordKind, VertexRecords};

/// GPU buffers and fixed layout info of one uploaded mesh.
///
/// The record kind (and with it the interleaved stride) is decided by the
/// first upload and never changes; later uploads only replace the vertex
/// payload.
pub struct MeshGpuHandle {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    vertex_bytes: u64,
    draw_count: u32,
    topology: wgpu::PrimitiveTopology,
    kind: RecordKind,
}

impl MeshGpuHandle {
    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.index_buffer.as_ref()
    }

    /// Number of vertices (or indices, when indexed) one draw covers.
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn has_normals(&self) -> bool {
        self.kind.has_normals()
    }

    pub fn has_colors(&self) -> bool {
        self.kind.has_colors()
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }
}

/// Table mapping mesh identity to GPU buffers.
///
/// Supports per-frame vertex refreshes without reallocation: re-uploading a
/// known mesh overwrites buffer contents in place.
#[derive(Default)]
pub struct MeshBufferTable {
    handles: HashMap<MeshId, MeshGpuHandle>,
}

impl MeshBufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads vertex records for a mesh batch.
    ///
    /// The first upload allocates buffers and fixes the record layout; later
    /// uploads must carry the same record kind and byte size and only
    /// replace the payload.
    pub fn upload(&mut self, ctx: &RenderContext, batch: &MeshBatch, records: &VertexRecords) {
        if let Some(handle) = self.handles.get(&batch.id) {
            assert_eq!(
                handle.kind,
                records.kind(),
                "{}: record layout is fixed at first upload",
                batch.id
            );
            assert_eq!(
                handle.vertex_bytes,
                records.bytes().len() as u64,
                "{}: vertex payload size changed between uploads",
                batch.id
            );
            ctx.write_buffer(&handle.vertex_buffer, 0, records.bytes());
            return;
        }

        let vertex_buffer = ctx.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: records.bytes(),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let index_buffer = batch.index_list.as_ref().map(|indices| {
            ctx.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        let topology = if batch.strippified {
            wgpu::PrimitiveTopology::TriangleStrip
        } else {
            wgpu::PrimitiveTopology::TriangleList
        };

        tracing::debug!(
            "buffered {} ({} vertices, {:?})",
            batch.id,
            records.len(),
            records.kind()
        );

        self.handles.insert(
            batch.id,
            MeshGpuHandle {
                vertex_buffer,
                index_buffer,
                vertex_bytes: records.bytes().len() as u64,
                draw_count: batch.draw_count(),
                topology,
                kind: records.kind(),
            },
        );
    }

    /// Whether the mesh has been uploaded and not released.
    pub fn is_uploaded(&self, id: MeshId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Returns the GPU handle of an uploaded mesh.
    ///
    /// Panics when the mesh was never uploaded; that is a caller bug, not a
    /// recoverable state.
    pub fn get(&self, id: MeshId) -> &MeshGpuHandle {
        self.handles
            .get(&id)
            .unwrap_or_else(|| panic!("{id} was not buffered"))
    }

    /// Releases the mesh's GPU buffers and removes the table entry.
    ///
    /// Panics when the mesh was never uploaded; releasing twice is a caller
    /// bug. Re-uploading after release is treated as a fresh mesh.
    pub fn release(&mut self, id: MeshId) {
        if self.handles.remove(&id).is_none() {
            panic!("{id} was not buffered");
        }
        tracing::debug!("released {id}");
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drops all GPU buffers.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
