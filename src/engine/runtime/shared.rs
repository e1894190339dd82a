//! ### English
//! State shared between the renderer handle and its render thread.
//!
//! ### 中文
//! 渲染器句柄与其渲染线程之间共享的状态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::engine::error::RenderError;
use crate::engine::frame::{FrameSlot, Rotation};
use crate::engine::layout::SharedLayout;
use crate::engine::statistics::StatisticsTracker;
use crate::engine::throttle::RenderThrottle;

/// ### English
/// Receives graphics failures raised on the render thread.
///
/// ### 中文
/// 接收渲染线程上产生的图形错误。
pub trait ErrorCallback: Send + Sync {
    fn on_error(&self, error: &RenderError);
}

impl<F> ErrorCallback for F
where
    F: Fn(&RenderError) + Send + Sync,
{
    fn on_error(&self, error: &RenderError) {
        self(error)
    }
}

/// ### English
/// Frame lifecycle notifications, delivered on the render thread in draw order.
///
/// ### 中文
/// 帧生命周期通知，在渲染线程上按绘制顺序投递。
pub trait RendererEvents: Send + Sync {
    /// ### English
    /// First frame drawn since `initialize`.
    ///
    /// ### 中文
    /// 自 `initialize` 以来第一帧完成绘制。
    fn on_first_frame_rendered(&self) {}

    /// ### English
    /// Rotated size or rotation of incoming frames changed.
    ///
    /// ### 中文
    /// 到达帧的旋转后尺寸或旋转角度发生变化。
    fn on_frame_resolution_changed(&self, _width: u32, _height: u32, _rotation: Rotation) {}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(super) struct RendererShared<S> {
    /// ### English
    /// Log prefix (`"<name>: "`, or empty).
    ///
    /// ### 中文
    /// 日志前缀（`"<name>: "` 或空字符串）。
    pub(super) prefix: String,
    epoch: Instant,
    pub(super) slot: FrameSlot,
    pub(super) throttle: RenderThrottle,
    pub(super) statistics: StatisticsTracker,
    pub(super) layout: SharedLayout,
    /// ### English
    /// Surface waiting for the next `CreateSurface` task. Cleared by `detach_surface` so a
    /// queued attach becomes a no-op.
    ///
    /// ### 中文
    /// 等待下一个 `CreateSurface` 任务的 surface。`detach_surface` 会清空它，使已排队的挂载变为空操作。
    pub(super) pending_surface: Mutex<Option<S>>,
    error_callback: Mutex<Option<Arc<dyn ErrorCallback>>>,
    events: Mutex<Option<Arc<dyn RendererEvents>>>,
    /// ### English
    /// Cleared when the render thread stops after a panic.
    ///
    /// ### 中文
    /// 渲染线程因 panic 退出时清除。
    alive: AtomicBool,
}

impl<S> RendererShared<S> {
    pub(super) fn new(name: &str) -> Self {
        Self {
            prefix: if name.is_empty() {
                String::new()
            } else {
                format!("{name}: ")
            },
            epoch: Instant::now(),
            slot: FrameSlot::default(),
            throttle: RenderThrottle::default(),
            statistics: StatisticsTracker::default(),
            layout: SharedLayout::default(),
            pending_surface: Mutex::new(None),
            error_callback: Mutex::new(None),
            events: Mutex::new(None),
            alive: AtomicBool::new(false),
        }
    }

    /// ### English
    /// Monotonic nanoseconds since this renderer was created.
    ///
    /// ### 中文
    /// 自渲染器创建以来的单调纳秒数。
    pub(super) fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    pub(super) fn set_pending_surface(&self, surface: Option<S>) {
        *lock(&self.pending_surface) = surface;
    }

    pub(super) fn take_pending_surface(&self) -> Option<S> {
        lock(&self.pending_surface).take()
    }

    pub(super) fn set_error_callback(&self, callback: Option<Arc<dyn ErrorCallback>>) {
        *lock(&self.error_callback) = callback;
    }

    pub(super) fn error_callback(&self) -> Option<Arc<dyn ErrorCallback>> {
        lock(&self.error_callback).clone()
    }

    pub(super) fn set_events(&self, events: Option<Arc<dyn RendererEvents>>) {
        *lock(&self.events) = events;
    }

    pub(super) fn events(&self) -> Option<Arc<dyn RendererEvents>> {
        lock(&self.events).clone()
    }

    pub(super) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
