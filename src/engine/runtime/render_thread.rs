//! ### English
//! Dedicated render thread: owns the graphics context and runs every queued render task.
//!
//! ### 中文
//! 独立渲染线程：持有图形上下文并执行所有排队的渲染任务。

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use image::RgbaImage;
use tracing::{debug, error, info, warn};

use crate::engine::config::SurfaceConfig;
use crate::engine::error::RenderError;
use crate::engine::frame::{Rotation, VideoFrame};
use crate::engine::rendering::{
    DrawPipeline, DrawerOf, GlDrawer, Gpu, GpuOf, GraphicsBackend, GraphicsContext,
    GraphicsSurfaceOwner, SurfaceOf, TextureFramebuffer, Viewport,
};
use crate::engine::snapshot::{FrameListener, SnapshotRegistry, SnapshotRequest};
use crate::engine::throttle::ThrottleDecision;

use super::command::RenderTask;
use super::queue::TaskReceiver;
use super::shared::RendererShared;

/// ### English
/// Everything the render thread needs to create its context.
///
/// ### 中文
/// 渲染线程创建上下文所需的全部参数。
pub(super) struct RenderThreadSetup<B: GraphicsBackend> {
    pub(super) backend: B,
    pub(super) shared_context: Option<B::SharedContext>,
    pub(super) surface_config: SurfaceConfig,
    pub(super) drawer: DrawerOf<B>,
    /// ### English
    /// Forward frame timestamps to `swap_buffers`.
    ///
    /// ### 中文
    /// 将帧时间戳传给 `swap_buffers`。
    pub(super) use_presentation_timestamp: bool,
    pub(super) statistics_interval: Duration,
}

/// ### English
/// Render thread entry function.
/// Returns after `Quit`, after a task panics, or when context creation fails.
///
/// ### 中文
/// 渲染线程入口函数。
/// 收到 `Quit`、任务 panic 或上下文创建失败时返回。
pub(super) fn run_render_thread<B: GraphicsBackend>(
    setup: RenderThreadSetup<B>,
    shared: Arc<RendererShared<SurfaceOf<B>>>,
    mut tasks: TaskReceiver<B>,
    init_tx: channel::Sender<Result<(), RenderError>>,
) {
    let RenderThreadSetup {
        backend,
        shared_context,
        surface_config,
        drawer,
        use_presentation_timestamp,
        statistics_interval,
    } = setup;

    let context = match backend.create_context(shared_context, &surface_config) {
        Ok(context) => context,
        Err(err) => {
            error!("{}Failed to create graphics context: {err}", shared.prefix);
            let _ = init_tx.send(Err(err));
            return;
        }
    };

    let mut thread = RenderThread::<B>::new(
        context,
        drawer,
        Arc::clone(&shared),
        use_presentation_timestamp,
        statistics_interval,
    );

    shared.set_alive(true);
    if init_tx.send(Ok(())).is_err() {
        /*
        ### English
        The caller stopped waiting (init timeout); nobody will ever send work.

        ### 中文
        调用方已停止等待（初始化超时）；不会再有任务到来。
        */
        warn!("{}Initialization abandoned by caller", shared.prefix);
        shared.set_alive(false);
        thread.release();
        return;
    }
    drop(init_tx);

    tasks.schedule(
        RenderTask::LogStatistics,
        Instant::now() + statistics_interval,
    );

    while let Some(task) = tasks.next() {
        let name = task.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| thread.run(task, &mut tasks)));
        match outcome {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => break,
            Err(_) => {
                error!("{}Render thread panicked in {name}, releasing", shared.prefix);
                shared.set_alive(false);
                let _ = panic::catch_unwind(AssertUnwindSafe(|| thread.release()));
                break;
            }
        }
    }

    shared.set_alive(false);
    debug!("{}Render thread exited", shared.prefix);
}

/// ### English
/// Render-thread-only state. Never leaves the thread that created the context.
///
/// ### 中文
/// 仅属于渲染线程的状态，永远不会离开创建上下文的线程。
struct RenderThread<B: GraphicsBackend> {
    shared: Arc<RendererShared<SurfaceOf<B>>>,
    owner: GraphicsSurfaceOwner<B::Context>,
    gpu: GpuOf<B>,
    drawer: DrawerOf<B>,
    pipeline: DrawPipeline<GpuOf<B>>,
    framebuffer: TextureFramebuffer<GpuOf<B>>,
    snapshots: SnapshotRegistry<GpuOf<B>>,
    use_presentation_timestamp: bool,
    statistics_interval: Duration,
    /// ### English
    /// Rotated size and rotation of the last frame taken from the slot.
    ///
    /// ### 中文
    /// 最近一次从槽中取出的帧的旋转后尺寸与旋转角度。
    last_resolution: Option<(PhysicalSize<u32>, Rotation)>,
    first_frame_rendered: bool,
    released: bool,
}

impl<B: GraphicsBackend> RenderThread<B> {
    fn new(
        context: B::Context,
        drawer: DrawerOf<B>,
        shared: Arc<RendererShared<SurfaceOf<B>>>,
        use_presentation_timestamp: bool,
        statistics_interval: Duration,
    ) -> Self {
        let gpu = context.gpu();
        Self {
            shared,
            owner: GraphicsSurfaceOwner::new(context),
            gpu,
            drawer,
            pipeline: DrawPipeline::default(),
            framebuffer: TextureFramebuffer::default(),
            snapshots: SnapshotRegistry::default(),
            use_presentation_timestamp,
            statistics_interval,
            last_resolution: None,
            first_frame_rendered: false,
            released: false,
        }
    }

    fn run(&mut self, task: RenderTask<B>, tasks: &mut TaskReceiver<B>) -> ControlFlow<()> {
        match task {
            RenderTask::CreateSurface => self.create_surface(),
            RenderTask::ReleaseSurface { on_complete } => {
                self.owner.release_surface();
                on_complete();
            }
            RenderTask::RenderFrame => self.render_frame(),
            RenderTask::AddListener(request) => self.add_listener(request),
            RenderTask::RemoveListener { listener, done } => {
                self.remove_listener(&listener);
                let _ = done.send(());
            }
            RenderTask::ClearImage { rgba } => self.clear_image(rgba),
            RenderTask::LogStatistics => {
                self.log_statistics();
                if !self.released {
                    tasks.schedule(
                        RenderTask::LogStatistics,
                        Instant::now() + self.statistics_interval,
                    );
                }
            }
            RenderTask::Release { done } => {
                self.release();
                tasks.cancel_delayed();
                let _ = done.send(());
            }
            RenderTask::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn create_surface(&mut self) {
        let Some(surface) = self.shared.take_pending_surface() else {
            return;
        };
        match self.owner.attach(surface) {
            Ok(true) => debug!("{}Surface created", self.shared.prefix),
            Ok(false) => debug!("{}Surface already attached, keeping it", self.shared.prefix),
            Err(RenderError::NotInitialized) => {
                debug!("{}Dropping surface attached after release", self.shared.prefix);
            }
            Err(err) => {
                error!("{}Failed to create surface: {err}", self.shared.prefix);
                self.report(&err);
            }
        }
    }

    fn add_listener(&mut self, request: SnapshotRequest<GpuOf<B>>) {
        if self.released {
            return;
        }
        self.snapshots.add(request);
    }

    fn remove_listener(&mut self, listener: &Arc<dyn FrameListener>) {
        for mut request in self.snapshots.remove(listener) {
            if let Some(mut drawer) = request.drawer.take() {
                drawer.release(&self.gpu);
            }
        }
    }

    fn clear_image(&mut self, rgba: [f32; 4]) {
        if !self.owner.has_surface() {
            return;
        }
        self.gpu.bind_framebuffer(None);
        self.gpu.clear(rgba);
        if let Err(err) = self.owner.swap_buffers(None) {
            error!("{}Failed to clear surface: {err}", self.shared.prefix);
            self.report(&err);
        }
    }

    fn log_statistics(&self) {
        let paused = self.shared.throttle.is_paused();
        if let Some(stats) = self.shared.statistics.take_summary(Instant::now(), paused) {
            debug!("{}{}", self.shared.prefix, stats.summary());
        }
    }

    fn render_frame(&mut self) {
        let Some(frame) = self.shared.slot.take() else {
            return;
        };
        self.update_resolution(&frame);

        if !self.owner.has_surface() {
            self.shared.statistics.record_no_surface_drop();
            debug!("{}Dropping frame: {}", self.shared.prefix, RenderError::NoSurface);
            frame.release();
            return;
        }

        let decision = self.shared.throttle.should_render(self.shared.now_ns());
        if decision != ThrottleDecision::Render {
            self.shared.statistics.record_throttled();
        }
        if let Err(err) = self.draw_and_notify(&frame, decision) {
            self.handle_draw_error(err);
        }
        frame.release();
    }

    fn update_resolution(&mut self, frame: &VideoFrame) {
        let resolution = (frame.rotated_size(), frame.rotation());
        if self.last_resolution == Some(resolution) {
            return;
        }
        self.last_resolution = Some(resolution);
        let (size, rotation) = resolution;
        info!(
            "{}Reporting frame resolution changed to {}x{} with rotation {}",
            self.shared.prefix,
            size.width,
            size.height,
            rotation.degrees()
        );
        if let Some(events) = self.shared.events() {
            events.on_frame_resolution_changed(size.width, size.height, rotation);
        }
    }

    fn draw_and_notify(
        &mut self,
        frame: &VideoFrame,
        decision: ThrottleDecision,
    ) -> Result<(), RenderError> {
        let was_rendered = decision == ThrottleDecision::Render;
        if was_rendered {
            self.draw_to_surface(frame)?;
        }
        self.notify_listeners(frame, was_rendered, decision == ThrottleDecision::Paused)
    }

    fn draw_to_surface(&mut self, frame: &VideoFrame) -> Result<(), RenderError> {
        let size = frame.rotated_size();
        let frame_aspect = size.width as f32 / size.height as f32;
        let draw_matrix = self.shared.layout.get().draw_matrix(frame_aspect);

        let start = Instant::now();
        self.gpu.bind_framebuffer(None);
        self.gpu.clear([0.0, 0.0, 0.0, 0.0]);
        self.pipeline.draw_frame(
            &self.gpu,
            frame,
            self.drawer.as_mut(),
            &draw_matrix,
            Viewport::full(self.owner.surface_size()),
        )?;

        let swap_start = Instant::now();
        let timestamp = self
            .use_presentation_timestamp
            .then(|| frame.timestamp_ns());
        self.owner.swap_buffers(timestamp)?;
        let end = Instant::now();
        self.shared
            .statistics
            .record_rendered(end - start, end - swap_start);

        if !self.first_frame_rendered {
            self.first_frame_rendered = true;
            info!("{}Reporting first rendered frame", self.shared.prefix);
            if let Some(events) = self.shared.events() {
                events.on_first_frame_rendered();
            }
        }
        Ok(())
    }

    fn notify_listeners(
        &mut self,
        frame: &VideoFrame,
        was_rendered: bool,
        paused: bool,
    ) -> Result<(), RenderError> {
        if self.snapshots.is_empty() {
            return Ok(());
        }
        let mut eligible = self.snapshots.take_eligible(was_rendered).into_iter();
        while let Some(mut request) = eligible.next() {
            let image = if paused {
                Ok(None)
            } else {
                self.snapshot(frame, &mut request)
            };
            if let Some(mut drawer) = request.drawer.take() {
                drawer.release(&self.gpu);
            }
            match image {
                Ok(image) => request.listener.on_frame(image),
                Err(err) => {
                    // Requests not reached yet stay registered for the next cycle.
                    eligible.for_each(|request| self.snapshots.add(request));
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// ### English
    /// Draws `frame` into the offscreen framebuffer at the request's scale and reads it back.
    ///
    /// ### 中文
    /// 按请求的比例将 `frame` 绘制到离屏 framebuffer 并读回像素。
    fn snapshot(
        &mut self,
        frame: &VideoFrame,
        request: &mut SnapshotRequest<GpuOf<B>>,
    ) -> Result<Option<RgbaImage>, RenderError> {
        let (width, height) = request.scaled_size(frame.rotated_width(), frame.rotated_height());
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let size = PhysicalSize::new(width, height);
        self.framebuffer.set_size(&self.gpu, size)?;
        self.framebuffer.bind(&self.gpu);
        self.gpu.clear([0.0, 0.0, 0.0, 0.0]);

        let snapshot_matrix = self.shared.layout.get().snapshot_matrix();
        let drawer: &mut dyn GlDrawer<GpuOf<B>> = match request.drawer.as_mut() {
            Some(drawer) => &mut **drawer,
            None => &mut *self.drawer,
        };
        let pixels = self
            .pipeline
            .draw_frame(&self.gpu, frame, drawer, &snapshot_matrix, Viewport::full(size))
            .and_then(|()| self.framebuffer.read(&self.gpu));
        self.gpu.bind_framebuffer(None);

        let image = RgbaImage::from_raw(width, height, pixels?).ok_or_else(|| {
            RenderError::Backend(format!("snapshot read-back is not {width}x{height}"))
        })?;
        Ok(Some(image))
    }

    fn handle_draw_error(&mut self, err: RenderError) {
        error!("{}Error while drawing frame: {err}", self.shared.prefix);
        self.report(&err);
        if err.is_out_of_memory() {
            /*
            ### English
            Free what we can; everything is recreated lazily on the next draw.

            ### 中文
            尽可能释放资源；下次绘制时会惰性重建。
            */
            self.drawer.release(&self.gpu);
            self.pipeline.release(&self.gpu);
            self.framebuffer.release(&self.gpu);
        }
    }

    fn report(&self, err: &RenderError) {
        if let Some(callback) = self.shared.error_callback() {
            callback.on_error(err);
        }
    }

    /// ### English
    /// Releases every graphics resource and the context (idempotent).
    /// Pending snapshot requests are dropped without being invoked.
    ///
    /// ### 中文
    /// 释放所有图形资源与上下文（幂等）。
    /// 未处理的快照请求直接丢弃，不会被回调。
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!("{}Releasing render resources", self.shared.prefix);
        if let Err(err) = self.owner.make_current() {
            warn!("{}Context not current during release: {err}", self.shared.prefix);
        }
        self.gpu.use_default_program();
        self.drawer.release(&self.gpu);
        self.pipeline.release(&self.gpu);
        self.framebuffer.release(&self.gpu);
        for mut request in self.snapshots.clear() {
            if let Some(mut drawer) = request.drawer.take() {
                drawer.release(&self.gpu);
            }
        }
        self.owner.release();
    }
}
