//! ### English
//! Public renderer handle that spawns and owns the dedicated render thread.
//!
//! ### 中文
//! 创建并持有独立渲染线程的对外渲染器句柄。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use crossbeam_channel::{self as channel, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::engine::config::{RendererConfig, SurfaceConfig};
use crate::engine::error::RenderError;
use crate::engine::frame::VideoFrame;
use crate::engine::rendering::{DrawerOf, GraphicsBackend, SurfaceOf};
use crate::engine::snapshot::{FrameListener, SnapshotRequest};
use crate::engine::statistics::RenderStatistics;

use super::command::RenderTask;
use super::queue::{TaskSender, task_queue};
use super::render_thread::{RenderThreadSetup, run_render_thread};
use super::shared::{ErrorCallback, RendererEvents, RendererShared};

/// ### English
/// Live render thread: task sender, identity and join handle.
///
/// ### 中文
/// 存活的渲染线程：任务发送端、线程标识与 join handle。
struct RenderThreadHandle<B: GraphicsBackend> {
    tasks: TaskSender<B>,
    thread_id: ThreadId,
    join: JoinHandle<()>,
}

/// ### English
/// Renders a stream of [`VideoFrame`]s onto a backend surface from a dedicated thread.
///
/// Every method may be called from any thread. Frame submission never blocks; `initialize`,
/// `shutdown` and `remove_snapshot_listener` wait for the render thread.
///
/// ### 中文
/// 在独立线程上把 [`VideoFrame`] 流渲染到后端 surface。
///
/// 所有方法都可以在任意线程调用。提交帧永不阻塞；`initialize`、`shutdown` 与
/// `remove_snapshot_listener` 会等待渲染线程。
pub struct VideoRenderer<B: GraphicsBackend> {
    config: RendererConfig,
    shared: Arc<RendererShared<SurfaceOf<B>>>,
    /// ### English
    /// `None` while uninitialized and after shutdown.
    ///
    /// ### 中文
    /// 未初始化及关闭后为 `None`。
    handle: Mutex<Option<RenderThreadHandle<B>>>,
}

impl<B: GraphicsBackend> VideoRenderer<B> {
    pub fn new(config: RendererConfig) -> Self {
        let shared = Arc::new(RendererShared::new(&config.name));
        Self {
            config,
            shared,
            handle: Mutex::new(None),
        }
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<RenderThreadHandle<B>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ### English
    /// Runs `f` with the task sender, or returns `None` when there is no render thread.
    ///
    /// ### 中文
    /// 使用任务发送端执行 `f`；没有渲染线程时返回 `None`。
    fn with_sender<R>(&self, f: impl FnOnce(&TaskSender<B>) -> R) -> Option<R> {
        self.lock_handle().as_ref().map(|handle| f(&handle.tasks))
    }

    fn on_render_thread(&self) -> bool {
        self.lock_handle()
            .as_ref()
            .is_some_and(|handle| handle.thread_id == thread::current().id())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// ### English
    /// Spawns the render thread and blocks until its graphics context exists.
    ///
    /// #### Parameters
    /// - `backend`: Creates the context on the render thread.
    /// - `shared_context`: Optional context to share textures with.
    /// - `surface_config`: Pixel format and GLES version of the context.
    /// - `drawer`: Draws frames onto the surface and, by default, into snapshots.
    /// - `use_presentation_timestamp`: Forward frame timestamps to the swap call.
    ///
    /// ### 中文
    /// 创建渲染线程，并阻塞直到其图形上下文创建完成。
    ///
    /// #### 参数
    /// - `backend`：在渲染线程上创建上下文。
    /// - `shared_context`：可选的纹理共享上下文。
    /// - `surface_config`：上下文的像素格式与 GLES 版本。
    /// - `drawer`：把帧绘制到 surface，默认也用于快照。
    /// - `use_presentation_timestamp`：将帧时间戳传给缓冲交换调用。
    pub fn initialize(
        &self,
        backend: B,
        shared_context: Option<B::SharedContext>,
        surface_config: SurfaceConfig,
        drawer: DrawerOf<B>,
        use_presentation_timestamp: bool,
    ) -> Result<(), RenderError> {
        let mut handle = self.lock_handle();
        if handle.is_some() {
            return Err(RenderError::AlreadyInitialized {
                name: self.config.name.clone(),
            });
        }
        info!("{}Initializing renderer", self.shared.prefix);

        self.shared.statistics.reset(Instant::now());
        let (tasks, receiver) = task_queue::<B>();
        let (init_tx, init_rx) = channel::bounded(1);
        let setup = RenderThreadSetup {
            backend,
            shared_context,
            surface_config,
            drawer,
            use_presentation_timestamp,
            statistics_interval: self.config.statistics_interval,
        };
        let shared = Arc::clone(&self.shared);
        let thread_name = if self.config.name.is_empty() {
            "VideoRenderThread".to_string()
        } else {
            format!("{}RenderThread", self.config.name)
        };

        let join = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_render_thread(setup, shared, receiver, init_tx))
            .map_err(|err| RenderError::ThreadSpawn(err.to_string()))?;

        match init_rx.recv_timeout(self.config.init_timeout) {
            Ok(Ok(())) => {
                *handle = Some(RenderThreadHandle {
                    tasks,
                    thread_id: join.thread().id(),
                    join,
                });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = join.join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                /*
                ### English
                Don't join: the thread may be stuck inside the platform. Dropping the senders
                makes it exit on its own once context creation returns.

                ### 中文
                不 join：线程可能卡在平台调用中。丢弃发送端后，上下文创建返回时线程会自行退出。
                */
                warn!("{}Timed out creating graphics context", self.shared.prefix);
                drop(tasks);
                Err(RenderError::InitTimeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = join.join();
                Err(RenderError::RenderThreadGone)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_handle().is_some() && self.shared.is_alive()
    }

    /// ### English
    /// Id of the render thread, while one is running.
    ///
    /// ### 中文
    /// 渲染线程运行期间返回其线程 id。
    pub fn render_thread_id(&self) -> Option<ThreadId> {
        self.lock_handle().as_ref().map(|handle| handle.thread_id)
    }

    /// ### English
    /// Queues creation of a surface. Ignored when a surface is already attached; a later
    /// [`Self::detach_surface`] cancels it if it has not run yet.
    ///
    /// ### 中文
    /// 排队创建 surface。已挂载 surface 时忽略；若尚未执行，之后的
    /// [`Self::detach_surface`] 会取消它。
    pub fn attach_surface(&self, surface: SurfaceOf<B>) {
        self.with_sender(|tasks| {
            self.shared.set_pending_surface(Some(surface));
            tasks.post(RenderTask::CreateSurface);
        });
    }

    /// ### English
    /// Detaches and releases the surface ahead of queued work, then runs `on_complete` on the
    /// render thread. Runs `on_complete` right away when uninitialized.
    ///
    /// ### 中文
    /// 优先于排队任务解除并释放 surface，然后在渲染线程上执行 `on_complete`。
    /// 未初始化时立即执行 `on_complete`。
    pub fn detach_surface(&self, on_complete: impl FnOnce() + Send + 'static) {
        self.shared.set_pending_surface(None);
        let mut on_complete: Option<Box<dyn FnOnce() + Send>> = Some(Box::new(on_complete));
        self.with_sender(|tasks| {
            if let Some(on_complete) = on_complete.take() {
                if !tasks.post_front(RenderTask::ReleaseSurface { on_complete }) {
                    debug!("{}Render thread gone, surface already released", self.shared.prefix);
                }
            }
        });
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }

    /// ### English
    /// Hands one frame reference to the renderer. Never blocks.
    ///
    /// A frame still waiting from an earlier call is dropped and released. Frames submitted while
    /// uninitialized are released immediately.
    ///
    /// ### 中文
    /// 把一个帧引用交给渲染器，永不阻塞。
    ///
    /// 之前仍在等待的帧会被丢弃并释放。未初始化时提交的帧会立即释放。
    pub fn submit_frame(&self, frame: VideoFrame) {
        let handle = self.lock_handle();
        let Some(handle) = handle.as_ref() else {
            debug!("{}Dropping frame: renderer not initialized", self.shared.prefix);
            frame.release();
            return;
        };
        let dropped_previous = self.shared.slot.put(frame);
        self.shared.statistics.record_received(dropped_previous);
        if !handle.tasks.post(RenderTask::RenderFrame) {
            self.shared.slot.clear();
        }
    }

    /// ### English
    /// Releases every graphics resource and stops the render thread, blocking until it exits.
    ///
    /// Idempotent. Returns [`RenderError::InvalidThread`] when called from the render thread.
    ///
    /// ### 中文
    /// 释放所有图形资源并停止渲染线程，阻塞直到线程退出。
    ///
    /// 幂等。在渲染线程上调用时返回 [`RenderError::InvalidThread`]。
    pub fn shutdown(&self) -> Result<(), RenderError> {
        if self.on_render_thread() {
            return Err(RenderError::InvalidThread {
                operation: "shutdown",
            });
        }
        let Some(handle) = self.lock_handle().take() else {
            return Ok(());
        };
        info!("{}Releasing renderer", self.shared.prefix);

        let (done_tx, done_rx) = channel::bounded(1);
        if handle.tasks.post_front(RenderTask::Release { done: done_tx }) {
            let _ = handle.tasks.post(RenderTask::Quit);
            let _ = done_rx.recv();
        }
        drop(handle.tasks);
        let _ = handle.join.join();

        self.shared.slot.clear();
        self.shared.set_pending_surface(None);
        info!("{}Renderer released", self.shared.prefix);
        Ok(())
    }

    /// ### English
    /// Caps the render rate. `fps <= 0` (or NaN) pauses drawing, `f32::INFINITY` removes the cap.
    ///
    /// ### 中文
    /// 限制渲染速率。`fps <= 0`（或 NaN）暂停绘制，`f32::INFINITY` 取消限制。
    pub fn set_fps_reduction(&self, fps: f32) {
        debug!("{}Setting fps reduction to {fps}", self.shared.prefix);
        self.shared
            .throttle
            .set_fps_reduction(fps, self.shared.now_ns());
    }

    pub fn disable_fps_reduction(&self) {
        self.set_fps_reduction(f32::INFINITY);
    }

    pub fn pause_video(&self) {
        self.set_fps_reduction(0.0);
    }

    /// ### English
    /// Minimum render period currently in effect, in nanoseconds (`u64::MAX` when paused).
    ///
    /// ### 中文
    /// 当前生效的最小渲染周期（纳秒，暂停时为 `u64::MAX`）。
    pub fn min_render_period_ns(&self) -> u64 {
        self.shared.throttle.period_ns()
    }

    pub fn set_mirror(&self, mirror: bool) {
        self.shared
            .layout
            .update(|layout| layout.mirror_horizontally = mirror);
    }

    pub fn set_mirror_vertically(&self, mirror: bool) {
        self.shared
            .layout
            .update(|layout| layout.mirror_vertically = mirror);
    }

    /// ### English
    /// Crops frames to `ratio` (width / height). `0.0` follows each frame's own aspect ratio.
    ///
    /// ### 中文
    /// 把帧裁剪为 `ratio`（宽 / 高）。`0.0` 表示跟随每帧自身的宽高比。
    pub fn set_layout_aspect_ratio(&self, ratio: f32) {
        self.shared
            .layout
            .update(|layout| layout.layout_aspect_ratio = ratio);
    }

    /// ### English
    /// Clears the surface to transparent black ahead of queued work.
    ///
    /// ### 中文
    /// 优先于排队任务，把 surface 清为透明黑色。
    pub fn clear_image(&self) {
        self.clear_image_with([0.0, 0.0, 0.0, 0.0]);
    }

    pub fn clear_image_with(&self, rgba: [f32; 4]) {
        self.with_sender(|tasks| tasks.post_front(RenderTask::ClearImage { rgba }));
    }

    /// ### English
    /// Registers a one-shot snapshot request, served after the next eligible draw cycle.
    ///
    /// #### Parameters
    /// - `listener`: Receives the image on the render thread. Identity is the `Arc` allocation.
    /// - `scale`: Fraction of the rotated frame size, in `(0, 1]`.
    /// - `drawer`: Drawer used for this snapshot instead of the renderer's own.
    /// - `only_if_rendered`: Wait for a frame that passed the fps throttle.
    ///
    /// ### 中文
    /// 注册一次性快照请求，在下一个符合条件的绘制周期后处理。
    ///
    /// #### 参数
    /// - `listener`：在渲染线程上接收图像；以 `Arc` 分配地址作为标识。
    /// - `scale`：相对旋转后帧尺寸的比例，取值 `(0, 1]`。
    /// - `drawer`：本次快照使用的 drawer，替代渲染器自身的 drawer。
    /// - `only_if_rendered`：只使用通过 fps 节流的帧。
    pub fn add_snapshot_listener(
        &self,
        listener: Arc<dyn FrameListener>,
        scale: f32,
        drawer: Option<DrawerOf<B>>,
        only_if_rendered: bool,
    ) {
        self.with_sender(|tasks| {
            tasks.post(RenderTask::AddListener(SnapshotRequest {
                listener,
                scale,
                drawer,
                only_if_rendered,
            }))
        });
    }

    /// ### English
    /// Removes every pending request of `listener`, blocking until the render thread has applied
    /// it. No callback for `listener` runs after this returns.
    ///
    /// ### 中文
    /// 移除 `listener` 的所有待处理请求，并阻塞直到渲染线程完成移除。
    /// 返回后不会再有针对 `listener` 的回调。
    pub fn remove_snapshot_listener(
        &self,
        listener: &Arc<dyn FrameListener>,
    ) -> Result<(), RenderError> {
        if self.on_render_thread() {
            return Err(RenderError::InvalidThread {
                operation: "remove_snapshot_listener",
            });
        }
        let (done_tx, done_rx) = channel::bounded(1);
        let posted = self.with_sender(|tasks| {
            tasks.post(RenderTask::RemoveListener {
                listener: Arc::clone(listener),
                done: done_tx,
            })
        });
        match posted {
            None => Ok(()),
            Some(false) => Err(RenderError::RenderThreadGone),
            Some(true) => done_rx.recv().map_err(|_| RenderError::RenderThreadGone),
        }
    }

    pub fn set_error_callback(&self, callback: Option<Arc<dyn ErrorCallback>>) {
        self.shared.set_error_callback(callback);
    }

    pub fn set_renderer_events(&self, events: Option<Arc<dyn RendererEvents>>) {
        self.shared.set_events(events);
    }

    /// ### English
    /// Counters accumulated since the last periodic log line.
    ///
    /// ### 中文
    /// 自上一次周期日志以来累计的统计数据。
    pub fn statistics(&self) -> RenderStatistics {
        self.shared.statistics.snapshot(Instant::now())
    }
}

impl<B: GraphicsBackend> Drop for VideoRenderer<B> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

