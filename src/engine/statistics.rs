//! ### English
//! Frame counters and timing accumulated between two periodic summaries.
//!
//! ### 中文
//! 两次周期性摘要之间累计的帧计数与耗时。

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// ### English
/// Point-in-time copy of the renderer statistics.
///
/// ### 中文
/// 渲染器统计数据的时间点快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStatistics {
    /// ### English
    /// Time covered by this window (since the last reset).
    ///
    /// ### 中文
    /// 该统计窗口覆盖的时长（自上次重置起）。
    pub elapsed: Duration,
    pub frames_received: u32,
    /// ### English
    /// Frames that were never drawn: overwritten in the pending slot before the render thread
    /// took them, or skipped by the fps throttle (including while paused).
    ///
    /// ### 中文
    /// 未被绘制的帧数：在渲染线程取走前就在待处理槽中被覆盖，或被 fps 节流跳过（含暂停期间）。
    pub frames_dropped: u32,
    pub frames_rendered: u32,
    /// ### English
    /// Frames discarded because no surface was attached.
    ///
    /// ### 中文
    /// 因未挂载 surface 而被丢弃的帧数。
    pub frames_dropped_no_surface: u32,
    pub render_time: Duration,
    pub swap_buffer_time: Duration,
}

impl RenderStatistics {
    /// ### English
    /// Rendered frames per second over the window.
    ///
    /// ### 中文
    /// 窗口内每秒渲染的帧数。
    pub fn render_fps(&self) -> f32 {
        let secs = self.elapsed.as_secs_f32();
        if secs > 0.0 {
            self.frames_rendered as f32 / secs
        } else {
            0.0
        }
    }

    /// ### English
    /// One-line summary in the format used by the periodic log.
    ///
    /// ### 中文
    /// 周期日志使用的单行摘要。
    pub fn summary(&self) -> String {
        format!(
            "Duration: {} ms. Frames received: {}. Dropped: {}. Rendered: {}. Render fps: {:.1}. \
             Average render time: {}. Average swapBuffer time: {}.",
            self.elapsed.as_millis(),
            self.frames_received,
            self.frames_dropped,
            self.frames_rendered,
            self.render_fps(),
            average_micros(self.render_time, self.frames_rendered),
            average_micros(self.swap_buffer_time, self.frames_rendered),
        )
    }
}

fn average_micros(total: Duration, count: u32) -> String {
    if count == 0 {
        "NA".to_string()
    } else {
        format!("{} us", (total / count).as_micros())
    }
}

#[derive(Debug)]
struct Counters {
    start: Instant,
    frames_received: u32,
    frames_dropped: u32,
    frames_rendered: u32,
    frames_dropped_no_surface: u32,
    render_time: Duration,
    swap_buffer_time: Duration,
}

impl Counters {
    fn new(start: Instant) -> Self {
        Self {
            start,
            frames_received: 0,
            frames_dropped: 0,
            frames_rendered: 0,
            frames_dropped_no_surface: 0,
            render_time: Duration::ZERO,
            swap_buffer_time: Duration::ZERO,
        }
    }

    fn snapshot(&self, now: Instant) -> RenderStatistics {
        RenderStatistics {
            elapsed: now.saturating_duration_since(self.start),
            frames_received: self.frames_received,
            frames_dropped: self.frames_dropped,
            frames_rendered: self.frames_rendered,
            frames_dropped_no_surface: self.frames_dropped_no_surface,
            render_time: self.render_time,
            swap_buffer_time: self.swap_buffer_time,
        }
    }
}

/// ### English
/// Statistics guarded by their own lock, updated from both producer and render threads.
///
/// ### 中文
/// 由独立锁保护的统计数据，生产者线程与渲染线程都会更新。
#[derive(Debug)]
pub(crate) struct StatisticsTracker {
    counters: Mutex<Counters>,
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self {
            counters: Mutex::new(Counters::new(Instant::now())),
        }
    }
}

impl StatisticsTracker {
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn reset(&self, now: Instant) {
        *self.lock() = Counters::new(now);
    }

    /// ### English
    /// Counts one submitted frame, and one dropped frame if it replaced a pending one.
    ///
    /// ### 中文
    /// 记录一帧提交；若替换了待处理帧，同时记录一帧丢弃。
    pub(crate) fn record_received(&self, dropped_previous: bool) {
        let mut counters = self.lock();
        counters.frames_received += 1;
        if dropped_previous {
            counters.frames_dropped += 1;
        }
    }

    /// ### English
    /// Counts one frame the throttle did not draw.
    ///
    /// ### 中文
    /// 记录一帧被节流器跳过、未绘制。
    pub(crate) fn record_throttled(&self) {
        self.lock().frames_dropped += 1;
    }

    pub(crate) fn record_no_surface_drop(&self) {
        self.lock().frames_dropped_no_surface += 1;
    }

    /// ### English
    /// Counts one drawn frame with the time spent drawing and swapping.
    ///
    /// ### 中文
    /// 记录一帧已绘制，并累计绘制与交换耗时。
    pub(crate) fn record_rendered(&self, render_time: Duration, swap_buffer_time: Duration) {
        let mut counters = self.lock();
        counters.frames_rendered += 1;
        counters.render_time += render_time;
        counters.swap_buffer_time += swap_buffer_time;
    }

    pub(crate) fn snapshot(&self, now: Instant) -> RenderStatistics {
        self.lock().snapshot(now)
    }

    /// ### English
    /// Returns the summary for the elapsed window and resets the counters, or `None` when there
    /// is nothing worth reporting (empty window, or paused with no incoming frames).
    ///
    /// ### 中文
    /// 返回当前窗口的摘要并重置计数；若没有值得报告的内容（窗口为空，或暂停且无帧到达）则返回 `None`。
    pub(crate) fn take_summary(&self, now: Instant, paused: bool) -> Option<RenderStatistics> {
        let mut counters = self.lock();
        let stats = counters.snapshot(now);
        if stats.elapsed.is_zero() || (paused && stats.frames_received == 0) {
            return None;
        }
        *counters = Counters::new(now);
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_matches_log_format() {
        let stats = RenderStatistics {
            elapsed: Duration::from_secs(4),
            frames_received: 120,
            frames_dropped: 3,
            frames_rendered: 100,
            frames_dropped_no_surface: 0,
            render_time: Duration::from_millis(200),
            swap_buffer_time: Duration::from_millis(50),
        };

        assert_eq!(
            stats.summary(),
            "Duration: 4000 ms. Frames received: 120. Dropped: 3. Rendered: 100. Render fps: 25.0. \
             Average render time: 2000 us. Average swapBuffer time: 500 us."
        );
    }

    #[test]
    fn averages_are_na_without_rendered_frames() {
        let tracker = StatisticsTracker::default();
        let start = Instant::now();
        tracker.reset(start);
        tracker.record_received(false);

        let summary = tracker
            .take_summary(start + Duration::from_secs(1), false)
            .expect("window has data")
            .summary();
        assert!(summary.ends_with("Average render time: NA. Average swapBuffer time: NA."));
    }

    #[test]
    fn take_summary_resets_window() {
        let tracker = StatisticsTracker::default();
        let start = Instant::now();
        tracker.reset(start);
        tracker.record_received(false);
        tracker.record_received(true);
        tracker.record_rendered(Duration::from_millis(1), Duration::from_millis(1));

        let later = start + Duration::from_secs(4);
        let stats = tracker.take_summary(later, false).expect("summary");
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.frames_rendered, 1);

        let after = tracker.snapshot(later);
        assert_eq!(after.frames_received, 0);
        assert_eq!(after.elapsed, Duration::ZERO);
    }

    #[test]
    fn throttled_frames_count_as_dropped() {
        let tracker = StatisticsTracker::default();
        let start = Instant::now();
        tracker.reset(start);
        for rendered in [true, false, true, false] {
            tracker.record_received(false);
            if rendered {
                tracker.record_rendered(Duration::ZERO, Duration::ZERO);
            } else {
                tracker.record_throttled();
            }
        }

        let stats = tracker.snapshot(start);
        assert_eq!(stats.frames_received, 4);
        assert_eq!(stats.frames_rendered, 2);
        assert_eq!(stats.frames_dropped, 2);
    }

    #[test]
    fn paused_idle_window_is_not_reported() {
        let tracker = StatisticsTracker::default();
        let start = Instant::now();
        tracker.reset(start);

        assert!(tracker.take_summary(start + Duration::from_secs(4), true).is_none());
        assert!(tracker.take_summary(start, false).is_none());
        assert!(tracker.take_summary(start + Duration::from_secs(4), false).is_some());
    }
}
