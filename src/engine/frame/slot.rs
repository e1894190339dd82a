use std::sync::{Mutex, MutexGuard, PoisonError};

use super::VideoFrame;

/// ### English
/// Single pending-frame hand-off between producers and the render thread (latest wins).
///
/// Replacing and taking happen under one lock, so a producer can never observe a
/// half-replaced slot and the render thread can never take a frame twice.
///
/// ### 中文
/// 生产者与渲染线程之间的单帧交接槽（只保留最新帧）。
///
/// 替换与取出在同一把锁内完成，生产者不会看到替换到一半的状态，渲染线程也不会重复取出同一帧。
#[derive(Default)]
pub(crate) struct FrameSlot {
    pending: Mutex<Option<VideoFrame>>,
}

impl FrameSlot {
    fn lock(&self) -> MutexGuard<'_, Option<VideoFrame>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ### English
    /// Stores `frame`, releasing the previous occupant. Returns `true` if one was dropped.
    ///
    /// ### 中文
    /// 存入 `frame`，并释放之前占用槽位的帧；若有帧被丢弃则返回 `true`。
    pub(crate) fn put(&self, frame: VideoFrame) -> bool {
        let previous = self.lock().replace(frame);
        match previous {
            Some(stale) => {
                stale.release();
                true
            }
            None => false,
        }
    }

    pub(crate) fn take(&self) -> Option<VideoFrame> {
        self.lock().take()
    }

    /// ### English
    /// Releases the pending frame, if any. Returns whether a frame was released.
    ///
    /// ### 中文
    /// 释放待处理帧（如有），返回是否释放了帧。
    pub(crate) fn clear(&self) -> bool {
        match self.take() {
            Some(frame) => {
                frame.release();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.lock().is_some()
    }
}
