//! ### English
//! Render-rate throttle, decoupled from the frame arrival rate.
//!
//! ### 中文
//! 渲染速率节流器，与帧到达速率解耦。

use std::sync::{Mutex, MutexGuard, PoisonError};

/// ### English
/// Period value that means "never render".
///
/// ### 中文
/// 表示“永不渲染”（暂停）的周期值。
pub(crate) const PAUSED_PERIOD_NS: u64 = u64::MAX;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// ### English
/// Outcome of asking the throttle about one frame.
///
/// ### 中文
/// 针对单帧询问节流器的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThrottleDecision {
    Render,
    /// ### English
    /// The minimum period has not elapsed yet.
    ///
    /// ### 中文
    /// 最小渲染周期尚未到达。
    Skip,
    Paused,
}

#[derive(Debug, Default)]
struct ThrottleState {
    /// ### English
    /// `0` renders every frame, [`PAUSED_PERIOD_NS`] renders none.
    ///
    /// ### 中文
    /// `0` 表示每帧都渲染，[`PAUSED_PERIOD_NS`] 表示全部不渲染。
    min_render_period_ns: u64,
    next_frame_time_ns: u64,
}

/// ### English
/// Lock-protected throttle state shared between the control API and the render thread.
///
/// ### 中文
/// 在控制 API 与渲染线程之间共享、由锁保护的节流状态。
#[derive(Debug, Default)]
pub(crate) struct RenderThrottle {
    state: Mutex<ThrottleState>,
}

impl RenderThrottle {
    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ### English
    /// Converts a target fps into a minimum render period.
    ///
    /// Non-positive (or NaN) fps pauses rendering, infinite fps removes the limit.
    ///
    /// ### 中文
    /// 把目标 fps 换算为最小渲染周期。
    ///
    /// 非正数（或 NaN）表示暂停，无穷大表示不限制。
    pub(crate) fn period_for_fps(fps: f32) -> u64 {
        if fps.is_nan() || fps <= 0.0 {
            PAUSED_PERIOD_NS
        } else if fps.is_infinite() {
            0
        } else {
            (NANOS_PER_SECOND / f64::from(fps)) as u64
        }
    }

    /// ### English
    /// Applies a new fps limit. The next-frame deadline is reset to `now_ns` only when the
    /// period actually changes.
    ///
    /// #### Parameters
    /// - `fps`: Target frame rate.
    /// - `now_ns`: Current monotonic time.
    ///
    /// ### 中文
    /// 应用新的 fps 上限。仅当周期确实变化时，才把下一帧截止时间重置为 `now_ns`。
    ///
    /// #### 参数
    /// - `fps`：目标帧率。
    /// - `now_ns`：当前单调时间。
    pub(crate) fn set_fps_reduction(&self, fps: f32, now_ns: u64) {
        let period = Self::period_for_fps(fps);
        let mut state = self.lock();
        if period != state.min_render_period_ns {
            state.min_render_period_ns = period;
            state.next_frame_time_ns = now_ns;
        }
    }

    /// ### English
    /// Decides whether the frame arriving at `now_ns` is drawn, advancing the deadline when so.
    ///
    /// The deadline moves forward by one period and is then clamped to `now_ns`, so a long
    /// stall never produces a burst of catch-up renders.
    ///
    /// ### 中文
    /// 判断在 `now_ns` 到达的帧是否需要绘制；需要时推进截止时间。
    ///
    /// 截止时间先前进一个周期，再与 `now_ns` 取较大值，因此长时间卡顿后不会出现补帧爆发。
    pub(crate) fn should_render(&self, now_ns: u64) -> ThrottleDecision {
        let mut state = self.lock();
        match state.min_render_period_ns {
            PAUSED_PERIOD_NS => ThrottleDecision::Paused,
            0 => ThrottleDecision::Render,
            period => {
                if now_ns < state.next_frame_time_ns {
                    return ThrottleDecision::Skip;
                }
                state.next_frame_time_ns = state
                    .next_frame_time_ns
                    .saturating_add(period)
                    .max(now_ns);
                ThrottleDecision::Render
            }
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.lock().min_render_period_ns == PAUSED_PERIOD_NS
    }

    pub(crate) fn period_ns(&self) -> u64 {
        self.lock().min_render_period_ns
    }
}
