//! Order independent transparency buffers.
//!
//! Transparent fragments are not blended where they are drawn; the surface
//! shader appends them to a per-pixel linked list backed by the buffers
//! owned here, and a composite pass resolves each list back-to-front over
//! the opaque result. Lists live in three storage buffers: one head index
//! and one fragment count per pixel, plus a flat node pool allocated by an
//! atomic bump counter.

pub mod blend;
pub mod node;
pub mod resolve;

pub use node::{FRAGMENT_LIST_NULL, MAX_FRAGMENTS_PER_PIXEL, Node};

use crate::context::RenderContext;
use crate::error::RendererError;

/// Byte offset of the node array within the pool buffer; the header holds
/// the pool capacity and keeps the array 16-byte aligned.
const NODE_POOL_HEADER: u64 = 16;

/// GPU state of the fragment list compositor.
pub struct OitBuffer {
    width: u32,
    height: u32,
    node_budget_fraction: f32,
    capacity: u32,

    heads: wgpu::Buffer,
    counts: wgpu::Buffer,
    nodes: wgpu::Buffer,
    counter: wgpu::Buffer,

    head_clear: Vec<u8>,
    count_clear: Vec<u8>,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl OitBuffer {
    /// Creates and configures the buffers for the given viewport.
    ///
    /// `node_budget_fraction` (clamped to [0, 1]) scales the node pool:
    /// capacity = floor(16 * width * height * fraction).
    pub fn new(ctx: &RenderContext, width: u32, height: u32, node_budget_fraction: f32) -> Self {
        let node_budget_fraction = node_budget_fraction.clamp(0.0, 1.0);
        let capacity = pool_capacity(width, height, node_budget_fraction);
        let (heads, counts, nodes, counter) = allocate(ctx, width, height, capacity);
        let bind_group_layout = create_bind_group_layout(ctx);
        let bind_group =
            create_bind_group(ctx, &bind_group_layout, &heads, &counts, &nodes, &counter);

        tracing::debug!("fragment pool sized to {capacity} nodes for {width}x{height}");

        Self {
            width,
            height,
            node_budget_fraction,
            capacity,
            heads,
            counts,
            nodes,
            counter,
            head_clear: vec![0xFF; (width * height * 4) as usize],
            count_clear: vec![0; (width * height * 4) as usize],
            bind_group_layout,
            bind_group,
        }
    }

    /// Reallocates for a new viewport or node budget. No-op when nothing
    /// changed. Must not be called while a frame is being recorded.
    pub fn configure(
        &mut self,
        ctx: &RenderContext,
        width: u32,
        height: u32,
        node_budget_fraction: f32,
    ) {
        let node_budget_fraction = node_budget_fraction.clamp(0.0, 1.0);
        if width == self.width
            && height == self.height
            && node_budget_fraction == self.node_budget_fraction
        {
            return;
        }
        *self = Self::new(ctx, width, height, node_budget_fraction);
    }

    /// Clears heads to the list-end sentinel and counts and the allocation
    /// counter to zero. Must run before any draw that may emit fragments.
    pub fn reset(&self, ctx: &RenderContext) {
        ctx.write_buffer(&self.heads, 0, &self.head_clear);
        ctx.write_buffer(&self.counts, 0, &self.count_clear);
        ctx.write_buffer(&self.counter, 0, &[0; 4]);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Node pool capacity in fragments.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn node_budget_fraction(&self) -> f32 {
        self.node_budget_fraction
    }

    /// Bind group layout for the accumulation stage (surface shaders).
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Bind group for the accumulation stage.
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn heads_buffer(&self) -> &wgpu::Buffer {
        &self.heads
    }

    pub fn counts_buffer(&self) -> &wgpu::Buffer {
        &self.counts
    }

    pub fn nodes_buffer(&self) -> &wgpu::Buffer {
        &self.nodes
    }

    /// Reads the fragment lists back to the host, ordered the way the
    /// composite shader consumes them.
    ///
    /// `opaque_depth` is one depth value per pixel for rejection, or `None`
    /// to keep every fragment. Blocks until the GPU catches up.
    pub fn read_node_lists(
        &self,
        ctx: &RenderContext,
        opaque_depth: Option<&[f32]>,
        sort: bool,
    ) -> Result<Vec<Vec<Node>>, RendererError> {
        let counter_bytes = ctx.read_buffer_sync(&self.counter, 0, 4)?;
        let allocated: u32 = bytemuck::pod_read_unaligned(&counter_bytes);
        let node_count = allocated.min(self.capacity);

        let heads_bytes = ctx.read_buffer_sync(&self.heads, 0, self.heads.size())?;
        let counts_bytes = ctx.read_buffer_sync(&self.counts, 0, self.counts.size())?;
        let heads: Vec<u32> = bytemuck::pod_collect_to_vec(&heads_bytes);
        let counts: Vec<u32> = bytemuck::pod_collect_to_vec(&counts_bytes);

        let nodes: Vec<Node> = if node_count == 0 {
            Vec::new()
        } else {
            let bytes = ctx.read_buffer_sync(
                &self.nodes,
                NODE_POOL_HEADER,
                node_count as u64 * size_of::<Node>() as u64,
            )?;
            bytemuck::pod_collect_to_vec(&bytes)
        };

        Ok(resolve::build_lists(
            self.width,
            self.height,
            &heads,
            &counts,
            &nodes,
            opaque_depth,
            sort,
        ))
    }
}

fn pool_capacity(width: u32, height: u32, fraction: f32) -> u32 {
    (MAX_FRAGMENTS_PER_PIXEL as f32 * width as f32 * height as f32 * fraction).floor() as u32
}

fn allocate(
    ctx: &RenderContext,
    width: u32,
    height: u32,
    capacity: u32,
) -> (wgpu::Buffer, wgpu::Buffer, wgpu::Buffer, wgpu::Buffer) {
    let pixel_bytes = (width * height * 4) as u64;
    let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;

    let heads = ctx.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Fragment Head Buffer"),
        size: pixel_bytes,
        usage: storage,
        mapped_at_creation: false,
    });
    let counts = ctx.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Fragment Count Buffer"),
        size: pixel_bytes,
        usage: storage,
        mapped_at_creation: false,
    });

    // Header carries the capacity (for allocation clamping) and the
    // viewport dimensions (for pixel addressing) to the shaders.
    let nodes = ctx.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Fragment Node Pool"),
        size: NODE_POOL_HEADER + capacity.max(1) as u64 * size_of::<Node>() as u64,
        usage: storage,
        mapped_at_creation: false,
    });
    ctx.write_buffer(&nodes, 0, bytemuck::bytes_of(&[capacity, width, height, 0]));

    let counter = ctx.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Fragment Allocation Counter"),
        size: 4,
        usage: storage,
        mapped_at_creation: false,
    });

    (heads, counts, nodes, counter)
}

fn create_bind_group_layout(ctx: &RenderContext) -> wgpu::BindGroupLayout {
    let entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Fragment List Bind Group Layout"),
        entries: &[entry(0), entry(1), entry(2), entry(3)],
    })
}

fn create_bind_group(
    ctx: &RenderContext,
    layout: &wgpu::BindGroupLayout,
    heads: &wgpu::Buffer,
    counts: &wgpu::Buffer,
    nodes: &wgpu::Buffer,
    counter: &wgpu::Buffer,
) -> wgpu::BindGroup {
    ctx.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Fragment List Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: heads.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: counts.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: nodes.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: counter.as_entire_binding(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_budget_fraction() {
        assert_eq!(pool_capacity(4, 4, 1.0), 256);
        assert_eq!(pool_capacity(4, 4, 0.5), 128);
        assert_eq!(pool_capacity(100, 100, 0.4), 64_000);
        assert_eq!(pool_capacity(4, 4, 0.0), 0);
    }
}
