//! 2D overlay pass.
//!
//! Overlays draw over the composited frame after the 3D pass: HUD sprites,
//! measurement text, debug canvases. Depth-tested overlays run first,
//! against the depth the composite pass published; the rest draw on top
//! unconditionally. The renderer provides the pass and ordering, overlay
//! implementations bring their own pipelines.

use crate::context::RenderContext;

/// One 2D overlay layer.
pub trait Overlay: Send + Sync {
    /// Unique name, used for removal.
    fn name(&self) -> &str;

    /// Whether this overlay tests against the scene depth. Depth-tested
    /// overlays render before untested ones.
    fn depth_tested(&self) -> bool;

    /// Called when the viewport changes.
    fn on_resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {}

    /// Records the overlay's draws. The pass targets the composited color
    /// buffer with the scene depth attached.
    fn render(&mut self, ctx: &RenderContext, pass: &mut wgpu::RenderPass<'_>);
}

/// Ordered overlay collection.
#[derive(Default)]
pub struct OverlayStack {
    overlays: Vec<Box<dyn Overlay>>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<O: Overlay + 'static>(&mut self, overlay: O) {
        self.overlays.push(Box::new(overlay));
    }

    /// Removes an overlay by name, returning it when found.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Overlay>> {
        let position = self.overlays.iter().position(|o| o.name() == name)?;
        Some(self.overlays.remove(position))
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn resize_all(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        for overlay in &mut self.overlays {
            overlay.on_resize(ctx, width, height);
        }
    }

    /// Renders all overlays: depth-tested first, then the rest.
    pub fn render_all(&mut self, ctx: &RenderContext, pass: &mut wgpu::RenderPass<'_>) {
        for overlay in self.overlays.iter_mut().filter(|o| o.depth_tested()) {
            overlay.render(ctx, pass);
        }
        for overlay in self.overlays.iter_mut().filter(|o| !o.depth_tested()) {
            overlay.render(ctx, pass);
        }
    }
}
