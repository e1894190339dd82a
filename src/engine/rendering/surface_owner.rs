use dpi::PhysicalSize;
use tracing::debug;

use crate::engine::error::RenderError;

use super::backend::{Gpu as _, GraphicsContext};

/// ### English
/// Owns the graphics context and its target surface on the render thread.
///
/// No internal locking: every call happens on the render thread. Releasing is idempotent.
///
/// ### 中文
/// 在渲染线程上持有图形上下文及其目标 surface。
///
/// 无内部锁：所有调用都发生在渲染线程上。释放操作是幂等的。
pub(crate) struct GraphicsSurfaceOwner<C: GraphicsContext> {
    context: C,
    released: bool,
}

impl<C: GraphicsContext> GraphicsSurfaceOwner<C> {
    pub(crate) fn new(context: C) -> Self {
        Self {
            context,
            released: false,
        }
    }

    pub(crate) fn has_surface(&self) -> bool {
        !self.released && self.context.has_surface()
    }

    pub(crate) fn surface_size(&self) -> PhysicalSize<u32> {
        self.context.surface_size()
    }

    /// ### English
    /// Creates the surface unless one is already attached, then makes the context current.
    /// Returns `Ok(false)` when an existing surface was kept.
    ///
    /// ### 中文
    /// 若尚未挂载 surface 则创建之，随后使上下文成为 current。
    /// 若保留了已有 surface，返回 `Ok(false)`。
    pub(crate) fn attach(&mut self, surface: C::Surface) -> Result<bool, RenderError> {
        if self.released {
            return Err(RenderError::NotInitialized);
        }
        if self.context.has_surface() {
            return Ok(false);
        }
        self.context.create_surface(surface)?;
        self.context.make_current()?;
        self.context.gpu().prepare_pixel_store();
        Ok(true)
    }

    pub(crate) fn make_current(&mut self) -> Result<(), RenderError> {
        self.context.make_current()
    }

    pub(crate) fn swap_buffers(&mut self, presentation_time_ns: Option<i64>) -> Result<(), RenderError> {
        self.context.swap_buffers(presentation_time_ns)
    }

    pub(crate) fn detach_current(&mut self) {
        if !self.released {
            self.context.detach_current();
        }
    }

    /// ### English
    /// Detaches and releases the current surface, keeping the context alive.
    ///
    /// ### 中文
    /// 解除并释放当前 surface，上下文保持存活。
    pub(crate) fn release_surface(&mut self) {
        if self.released || !self.context.has_surface() {
            return;
        }
        self.context.detach_current();
        self.context.release_surface();
    }

    /// ### English
    /// Releases surface and context (idempotent).
    ///
    /// ### 中文
    /// 释放 surface 与上下文（幂等）。
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        debug!("Releasing graphics context");
        self.detach_current();
        self.released = true;
        self.context.release();
    }
}

impl<C: GraphicsContext> Drop for GraphicsSurfaceOwner<C> {
    fn drop(&mut self) {
        self.release();
    }
}
