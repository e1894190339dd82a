//! ### English
//! Internal task protocol between renderer handles and the dedicated render thread.
//!
//! ### 中文
//! 渲染器句柄与独立渲染线程之间的内部任务协议。

use std::sync::Arc;

use crossbeam_channel as channel;

use crate::engine::rendering::{GpuOf, GraphicsBackend};
use crate::engine::snapshot::{FrameListener, SnapshotRequest};

/// ### English
/// Work items executed on the render thread, one at a time, in queue order.
///
/// ### 中文
/// 在渲染线程上按队列顺序逐个执行的工作项。
pub(super) enum RenderTask<B: GraphicsBackend> {
    /// ### English
    /// Creates the surface stored in the pending-surface slot, if any is still there.
    ///
    /// ### 中文
    /// 若待挂载 surface 槽中仍有 surface，则创建之。
    CreateSurface,
    /// ### English
    /// Detaches and releases the surface, then runs `on_complete` (front of queue).
    ///
    /// ### 中文
    /// 解除并释放 surface，然后执行 `on_complete`（插队执行）。
    ReleaseSurface {
        on_complete: Box<dyn FnOnce() + Send>,
    },
    /// ### English
    /// Draws whatever frame is pending in the slot.
    ///
    /// ### 中文
    /// 绘制槽中当前待处理的帧。
    RenderFrame,
    AddListener(SnapshotRequest<GpuOf<B>>),
    /// ### English
    /// Removes all requests of `listener`, then signals `done`.
    ///
    /// ### 中文
    /// 移除 `listener` 的所有请求，然后通过 `done` 通知。
    RemoveListener {
        listener: Arc<dyn FrameListener>,
        done: channel::Sender<()>,
    },
    /// ### English
    /// Clears the surface to `rgba` and swaps (front of queue).
    ///
    /// ### 中文
    /// 用 `rgba` 清空 surface 并交换缓冲（插队执行）。
    ClearImage { rgba: [f32; 4] },
    /// ### English
    /// Emits the periodic statistics line and re-schedules itself.
    ///
    /// ### 中文
    /// 输出周期统计日志并重新调度自身。
    LogStatistics,
    /// ### English
    /// Releases every graphics resource and signals `done` (front of queue).
    ///
    /// ### 中文
    /// 释放所有图形资源并通过 `done` 通知（插队执行）。
    Release { done: channel::Sender<()> },
    /// ### English
    /// Stops the render loop.
    ///
    /// ### 中文
    /// 停止渲染循环。
    Quit,
}

impl<B: GraphicsBackend> RenderTask<B> {
    pub(super) fn name(&self) -> &'static str {
        match self {
            RenderTask::CreateSurface => "CreateSurface",
            RenderTask::ReleaseSurface { .. } => "ReleaseSurface",
            RenderTask::RenderFrame => "RenderFrame",
            RenderTask::AddListener(_) => "AddListener",
            RenderTask::RemoveListener { .. } => "RemoveListener",
            RenderTask::ClearImage { .. } => "ClearImage",
            RenderTask::LogStatistics => "LogStatistics",
            RenderTask::Release { .. } => "Release",
            RenderTask::Quit => "Quit",
        }
    }
}
