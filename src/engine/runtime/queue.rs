//! ### English
//! Two-level task queue feeding the render thread.
//!
//! Front-of-queue work (surface release, clear, teardown) always runs before normal work.
//! Delayed work lives in a deadline heap owned by the render thread.
//!
//! ### 中文
//! 为渲染线程提供任务的两级队列。
//!
//! 插队任务（释放 surface、清屏、销毁）总是先于普通任务执行。
//! 延时任务存放在渲染线程持有的截止时间堆中。

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crossbeam_channel::{self as channel, Select, TryRecvError};

use crate::engine::rendering::GraphicsBackend;

use super::command::RenderTask;

/// ### English
/// One delayed task stored in the deadline heap.
///
/// `BinaryHeap` is a max-heap, so the ordering is reversed to pop the earliest deadline.
///
/// ### 中文
/// 存放在截止时间堆中的单个延时任务。
///
/// `BinaryHeap` 是最大堆，因此反转排序以便弹出最早的 deadline。
struct ScheduledTask<B: GraphicsBackend> {
    deadline: Instant,
    /// ### English
    /// Tiebreaker keeping equal deadlines in scheduling order.
    ///
    /// ### 中文
    /// 平局判定序号：保证相同 deadline 按调度顺序执行。
    seq: u64,
    task: RenderTask<B>,
}

impl<B: GraphicsBackend> PartialEq for ScheduledTask<B> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<B: GraphicsBackend> Eq for ScheduledTask<B> {}

impl<B: GraphicsBackend> PartialOrd for ScheduledTask<B> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<B: GraphicsBackend> Ord for ScheduledTask<B> {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.deadline.cmp(&self.deadline) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

/// ### English
/// Producer side of the queue, held by the renderer handle.
///
/// Posting fails once the render thread has exited.
///
/// ### 中文
/// 队列的生产者端，由渲染器句柄持有。
///
/// 渲染线程退出后投递会失败。
pub(super) struct TaskSender<B: GraphicsBackend> {
    front: channel::Sender<RenderTask<B>>,
    normal: channel::Sender<RenderTask<B>>,
}

impl<B: GraphicsBackend> TaskSender<B> {
    /// ### English
    /// Appends `task` to the normal queue. Returns `false` if the render thread is gone.
    ///
    /// ### 中文
    /// 将 `task` 追加到普通队列；渲染线程已退出时返回 `false`。
    pub(super) fn post(&self, task: RenderTask<B>) -> bool {
        self.normal.send(task).is_ok()
    }

    /// ### English
    /// Queues `task` ahead of all normal work.
    ///
    /// ### 中文
    /// 让 `task` 排在所有普通任务之前。
    pub(super) fn post_front(&self, task: RenderTask<B>) -> bool {
        self.front.send(task).is_ok()
    }
}

/// ### English
/// Consumer side of the queue, owned by the render thread.
///
/// ### 中文
/// 队列的消费者端，由渲染线程持有。
pub(super) struct TaskReceiver<B: GraphicsBackend> {
    front: channel::Receiver<RenderTask<B>>,
    normal: channel::Receiver<RenderTask<B>>,
    delayed: BinaryHeap<ScheduledTask<B>>,
    next_seq: u64,
}

/// ### English
/// Creates a connected sender/receiver pair.
///
/// ### 中文
/// 创建一对相连的发送端/接收端。
pub(super) fn task_queue<B: GraphicsBackend>() -> (TaskSender<B>, TaskReceiver<B>) {
    let (front_tx, front_rx) = channel::unbounded();
    let (normal_tx, normal_rx) = channel::unbounded();
    (
        TaskSender {
            front: front_tx,
            normal: normal_tx,
        },
        TaskReceiver {
            front: front_rx,
            normal: normal_rx,
            delayed: BinaryHeap::new(),
            next_seq: 0,
        },
    )
}

impl<B: GraphicsBackend> TaskReceiver<B> {
    /// ### English
    /// Runs `task` on the render thread once `deadline` has passed.
    ///
    /// ### 中文
    /// 在 `deadline` 到达后于渲染线程执行 `task`。
    pub(super) fn schedule(&mut self, task: RenderTask<B>, deadline: Instant) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.delayed.push(ScheduledTask {
            deadline,
            seq,
            task,
        });
    }

    /// ### English
    /// Drops every delayed task.
    ///
    /// ### 中文
    /// 丢弃所有延时任务。
    pub(super) fn cancel_delayed(&mut self) {
        self.delayed.clear();
    }

    fn pop_due(&mut self, now: Instant) -> Option<RenderTask<B>> {
        if self.delayed.peek()?.deadline <= now {
            self.delayed.pop().map(|scheduled| scheduled.task)
        } else {
            None
        }
    }

    /// ### English
    /// Non-blocking: front task, then due delayed task, then normal task.
    ///
    /// ### 中文
    /// 非阻塞：依次尝试插队任务、到期的延时任务、普通任务。
    pub(super) fn try_next(&mut self) -> Result<RenderTask<B>, TryRecvError> {
        let front = match self.front.try_recv() {
            Ok(task) => return Ok(task),
            Err(err) => err,
        };
        if let Some(task) = self.pop_due(Instant::now()) {
            return Ok(task);
        }
        match self.normal.try_recv() {
            Ok(task) => Ok(task),
            Err(TryRecvError::Disconnected) if front.is_disconnected() => {
                Err(TryRecvError::Disconnected)
            }
            Err(_) => Err(TryRecvError::Empty),
        }
    }

    /// ### English
    /// Blocks until the next task is available. Returns `None` once every sender is gone and
    /// the queues are drained; pending delayed tasks are discarded at that point.
    ///
    /// ### 中文
    /// 阻塞直到下一个任务可用。所有发送端都已断开且队列为空时返回 `None`，此时未到期的延时任务会被丢弃。
    pub(super) fn next(&mut self) -> Option<RenderTask<B>> {
        loop {
            match self.try_next() {
                Ok(task) => return Some(task),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }

            let mut select = Select::new();
            select.recv(&self.front);
            select.recv(&self.normal);
            match self.delayed.peek().map(|scheduled| scheduled.deadline) {
                Some(deadline) => {
                    let _ = select.ready_deadline(deadline);
                }
                None => {
                    select.ready();
                }
            }
        }
    }
}
