//! ### English
//! One-shot snapshot requests served after draw cycles.
//!
//! ### 中文
//! 在绘制周期之后处理的一次性快照请求。

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::engine::rendering::{GlDrawer, Gpu};

/// ### English
/// Receives one downscaled RGBA copy of a frame, or `None` when no image could be produced
/// (zero-sized target, or rendering paused).
///
/// Called on the render thread.
///
/// ### 中文
/// 接收一帧缩小后的 RGBA 副本；无法生成图像（目标尺寸为 0 或渲染暂停）时收到 `None`。
///
/// 在渲染线程上调用。
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, image: Option<RgbaImage>);
}

impl<F> FrameListener for F
where
    F: Fn(Option<RgbaImage>) + Send + Sync,
{
    fn on_frame(&self, image: Option<RgbaImage>) {
        self(image)
    }
}

/// ### English
/// Compares listeners by the address of their shared allocation.
///
/// ### 中文
/// 按共享分配的地址比较 listener。
pub(crate) fn same_listener(a: &Arc<dyn FrameListener>, b: &Arc<dyn FrameListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// ### English
/// A pending snapshot request.
///
/// ### 中文
/// 一个待处理的快照请求。
pub(crate) struct SnapshotRequest<G: Gpu> {
    pub(crate) listener: Arc<dyn FrameListener>,
    /// ### English
    /// Fraction of the rotated frame size, in `(0, 1]`.
    ///
    /// ### 中文
    /// 相对旋转后帧尺寸的比例，取值 `(0, 1]`。
    pub(crate) scale: f32,
    /// ### English
    /// Drawer used instead of the renderer's own.
    ///
    /// ### 中文
    /// 替代渲染器自身 drawer 的自定义 drawer。
    pub(crate) drawer: Option<Box<dyn GlDrawer<G>>>,
    /// ### English
    /// Serve only from a frame that passed the throttle and was drawn.
    ///
    /// ### 中文
    /// 只使用通过节流并实际绘制的帧来响应。
    pub(crate) only_if_rendered: bool,
}

impl<G: Gpu> SnapshotRequest<G> {
    pub(crate) fn is_eligible(&self, was_rendered: bool) -> bool {
        was_rendered || !self.only_if_rendered
    }

    /// ### English
    /// Target size for a frame of the given rotated size; zero in either axis means no image.
    ///
    /// ### 中文
    /// 针对给定旋转后帧尺寸的目标尺寸；任一轴为 0 表示不生成图像。
    pub(crate) fn scaled_size(&self, rotated_width: u32, rotated_height: u32) -> (u32, u32) {
        (
            (self.scale * rotated_width as f32) as u32,
            (self.scale * rotated_height as f32) as u32,
        )
    }
}

impl<G: Gpu> fmt::Debug for SnapshotRequest<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotRequest")
            .field("scale", &self.scale)
            .field("custom_drawer", &self.drawer.is_some())
            .field("only_if_rendered", &self.only_if_rendered)
            .finish()
    }
}

/// ### English
/// Pending requests, owned by the render thread.
///
/// ### 中文
/// 待处理请求集合，由渲染线程持有。
pub(crate) struct SnapshotRegistry<G: Gpu> {
    requests: Vec<SnapshotRequest<G>>,
}

impl<G: Gpu> Default for SnapshotRegistry<G> {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
        }
    }
}

impl<G: Gpu> SnapshotRegistry<G> {
    pub(crate) fn add(&mut self, request: SnapshotRequest<G>) {
        self.requests.push(request);
    }

    /// ### English
    /// Removes and returns every request registered by `listener`.
    ///
    /// ### 中文
    /// 移除并返回 `listener` 注册的所有请求。
    pub(crate) fn remove(&mut self, listener: &Arc<dyn FrameListener>) -> Vec<SnapshotRequest<G>> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.requests)
            .into_iter()
            .partition(|request| same_listener(&request.listener, listener));
        self.requests = kept;
        removed
    }

    /// ### English
    /// Removes and returns the requests that are served by this draw cycle, in registration
    /// order.
    ///
    /// ### 中文
    /// 按注册顺序移除并返回本次绘制周期需要响应的请求。
    pub(crate) fn take_eligible(&mut self, was_rendered: bool) -> Vec<SnapshotRequest<G>> {
        let (eligible, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.requests)
            .into_iter()
            .partition(|request| request.is_eligible(was_rendered));
        self.requests = kept;
        eligible
    }

    pub(crate) fn clear(&mut self) -> Vec<SnapshotRequest<G>> {
        std::mem::take(&mut self.requests)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
