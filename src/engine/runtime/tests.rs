use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use dpi::PhysicalSize;
use image::RgbaImage;

use super::test_support::{FakeBackend, FakeDrawer, FakeSurface, GpuLog, TrackedBuffer};
use super::{ErrorCallback, RendererEvents, VideoRenderer};
use crate::engine::config::{RendererConfig, SurfaceConfig};
use crate::engine::error::RenderError;
use crate::engine::frame::{Rotation, VideoFrame};
use crate::engine::rendering::Viewport;
use crate::engine::snapshot::FrameListener;

const WAIT: Duration = Duration::from_secs(5);

fn config() -> RendererConfig {
    RendererConfig {
        statistics_interval: Duration::from_secs(3600),
        ..RendererConfig::named("Test")
    }
}

fn start(log: &Arc<GpuLog>, use_presentation_timestamp: bool) -> VideoRenderer<FakeBackend> {
    let renderer = VideoRenderer::new(config());
    renderer
        .initialize(
            FakeBackend::new(log),
            None,
            SurfaceConfig::PLAIN,
            FakeDrawer::boxed(log),
            use_presentation_timestamp,
        )
        .expect("initialize");
    renderer
}

fn frame(width: u32, height: u32, rotation: Rotation, frees: &Arc<AtomicUsize>) -> VideoFrame {
    VideoFrame::new(TrackedBuffer::new(width, height, frees), rotation, 0)
}

/// Waits until every task queued so far has run.
fn barrier(renderer: &VideoRenderer<FakeBackend>) {
    let nobody: Arc<dyn FrameListener> = Arc::new(|_: Option<RgbaImage>| {});
    renderer.remove_snapshot_listener(&nobody).expect("barrier");
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
    }
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1.0e-4
}

fn image_listener() -> (Arc<dyn FrameListener>, channel::Receiver<Option<RgbaImage>>) {
    let (tx, rx) = channel::unbounded();
    let listener: Arc<dyn FrameListener> = Arc::new(move |image: Option<RgbaImage>| {
        let _ = tx.send(image);
    });
    (listener, rx)
}

#[test]
fn renders_submitted_frame_to_full_surface() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    assert!(renderer.is_initialized());

    renderer.attach_surface(FakeSurface::new(1));
    renderer.submit_frame(frame(640, 480, Rotation::Deg0, &frees));
    barrier(&renderer);

    assert_eq!(GpuLog::count(&log.draws), 1);
    assert_eq!(GpuLog::count(&log.swaps), 1);
    assert_eq!(
        log.last_viewport(),
        Some(Viewport {
            x: 0,
            y: 0,
            width: 1280,
            height: 720
        })
    );
    assert_eq!(frees.load(Ordering::SeqCst), 1);

    let stats = renderer.statistics();
    assert_eq!(stats.frames_received, 1);
    assert_eq!(stats.frames_rendered, 1);
    assert_eq!(stats.frames_dropped, 0);
}

#[test]
fn shutdown_twice_releases_once() {
    let log = Arc::new(GpuLog::default());
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));

    renderer.shutdown().expect("first shutdown");
    renderer.shutdown().expect("second shutdown");

    assert!(!renderer.is_initialized());
    assert!(renderer.render_thread_id().is_none());
    assert_eq!(GpuLog::count(&log.context_releases), 1);
    assert_eq!(GpuLog::count(&log.drawer_releases), 1);
}

#[test]
fn initialize_twice_is_rejected() {
    let log = Arc::new(GpuLog::default());
    let renderer = start(&log, false);

    let err = renderer
        .initialize(
            FakeBackend::new(&log),
            None,
            SurfaceConfig::PLAIN,
            FakeDrawer::boxed(&log),
            false,
        )
        .unwrap_err();
    assert_eq!(
        err,
        RenderError::AlreadyInitialized {
            name: "Test".to_string()
        }
    );
    assert!(renderer.is_initialized());
}

#[test]
fn failed_context_creation_can_be_retried() {
    let log = Arc::new(GpuLog::default());
    let renderer = VideoRenderer::new(config());
    let backend = FakeBackend {
        fail_create: true,
        ..FakeBackend::new(&log)
    };

    let err = renderer
        .initialize(backend, None, SurfaceConfig::PLAIN, FakeDrawer::boxed(&log), false)
        .unwrap_err();
    assert_eq!(err, RenderError::Backend("no display".to_string()));
    assert!(!renderer.is_initialized());

    renderer
        .initialize(
            FakeBackend::new(&log),
            None,
            SurfaceConfig::PLAIN,
            FakeDrawer::boxed(&log),
            false,
        )
        .expect("retry");
    assert!(renderer.is_initialized());
}

#[test]
fn second_attach_keeps_first_surface() {
    let log = Arc::new(GpuLog::default());
    let renderer = start(&log, false);

    renderer.attach_surface(FakeSurface::new(1));
    barrier(&renderer);
    renderer.attach_surface(FakeSurface::new(2));
    barrier(&renderer);

    assert_eq!(GpuLog::count(&log.surfaces_created), 1);
    assert_eq!(log.current_surface(), Some(1));
}

#[test]
fn detach_surface_runs_callback_and_drops_later_frames() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));
    barrier(&renderer);

    let (tx, rx) = channel::bounded(1);
    renderer.detach_surface(move || {
        let _ = tx.send(());
    });
    rx.recv_timeout(WAIT).expect("detach callback");
    assert_eq!(GpuLog::count(&log.surfaces_released), 1);
    assert_eq!(log.current_surface(), None);

    renderer.submit_frame(frame(320, 240, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert_eq!(renderer.statistics().frames_dropped_no_surface, 1);
    assert_eq!(GpuLog::count(&log.draws), 0);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn detach_surface_without_render_thread_completes_inline() {
    let renderer = VideoRenderer::<FakeBackend>::new(config());
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    renderer.detach_surface(move || flag.store(true, Ordering::SeqCst));
    assert!(done.load(Ordering::SeqCst));
}

#[test]
fn frame_without_surface_is_counted_and_released() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);

    renderer.submit_frame(frame(320, 240, Rotation::Deg0, &frees));
    barrier(&renderer);

    let stats = renderer.statistics();
    assert_eq!(stats.frames_received, 1);
    assert_eq!(stats.frames_dropped_no_surface, 1);
    assert_eq!(stats.frames_rendered, 0);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn frames_before_initialize_are_released_uncounted() {
    let renderer = VideoRenderer::<FakeBackend>::new(config());
    let frees = Arc::new(AtomicUsize::new(0));

    renderer.submit_frame(frame(320, 240, Rotation::Deg0, &frees));

    assert_eq!(frees.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.statistics().frames_received, 0);
}

#[test]
fn every_frame_is_released_exactly_once() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));

    for _ in 0..20 {
        renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    }
    barrier(&renderer);

    let stats = renderer.statistics();
    assert_eq!(stats.frames_received, 20);
    assert_eq!(stats.frames_rendered + stats.frames_dropped, 20);
    assert_eq!(GpuLog::count(&log.draws), stats.frames_rendered as usize);

    renderer.shutdown().expect("shutdown");
    assert_eq!(frees.load(Ordering::SeqCst), 20);
}

#[test]
fn pending_frame_is_released_by_shutdown() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.pause_video();
    renderer.attach_surface(FakeSurface::new(1));

    for _ in 0..5 {
        renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    }
    renderer.shutdown().expect("shutdown");

    assert_eq!(frees.load(Ordering::SeqCst), 5);
    assert_eq!(GpuLog::count(&log.draws), 0);
}

#[test]
fn presentation_timestamp_reaches_swap() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, true);
    renderer.attach_surface(FakeSurface::new(1));

    let buffer = TrackedBuffer::new(64, 64, &frees);
    renderer.submit_frame(VideoFrame::new(buffer, Rotation::Deg0, 42));
    barrier(&renderer);

    assert_eq!(log.last_timestamp(), Some(42));
}

#[test]
fn clear_image_swaps_attached_surface() {
    let log = Arc::new(GpuLog::default());
    let renderer = start(&log, false);

    renderer.clear_image();
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.swaps), 0);

    renderer.attach_surface(FakeSurface::new(1));
    barrier(&renderer);
    renderer.clear_image_with([1.0, 0.0, 0.0, 1.0]);
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.swaps), 1);
    assert_eq!(GpuLog::count(&log.clears), 1);
}

#[test]
fn only_if_rendered_listener_waits_for_unpause() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));
    renderer.pause_video();

    let (listener, images) = image_listener();
    renderer.add_snapshot_listener(Arc::clone(&listener), 0.5, None, true);
    renderer.submit_frame(frame(1280, 720, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert!(images.try_recv().is_err());
    assert_eq!(GpuLog::count(&log.draws), 0);

    renderer.disable_fps_reduction();
    renderer.submit_frame(frame(1280, 720, Rotation::Deg0, &frees));
    let image = images
        .recv_timeout(WAIT)
        .expect("snapshot delivered")
        .expect("snapshot image");
    assert_eq!(image.dimensions(), (640, 360));

    renderer.submit_frame(frame(1280, 720, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert!(images.try_recv().is_err());
}

#[test]
fn paused_listener_receives_none() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));
    renderer.pause_video();

    let (listener, images) = image_listener();
    renderer.add_snapshot_listener(listener, 1.0, None, false);
    renderer.submit_frame(frame(320, 240, Rotation::Deg0, &frees));

    assert_eq!(images.recv_timeout(WAIT).expect("notified"), None);
}

#[test]
fn tiny_snapshot_scale_yields_none() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));

    let (listener, images) = image_listener();
    renderer.add_snapshot_listener(listener, 0.001, None, false);
    renderer.submit_frame(frame(320, 240, Rotation::Deg0, &frees));

    assert_eq!(images.recv_timeout(WAIT).expect("notified"), None);
}

#[test]
fn custom_snapshot_drawer_is_used_then_released() {
    let log = Arc::new(GpuLog::default());
    let custom_log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));

    let (listener, images) = image_listener();
    renderer.add_snapshot_listener(listener, 1.0, Some(FakeDrawer::boxed(&custom_log)), true);
    renderer.submit_frame(frame(640, 480, Rotation::Deg90, &frees));
    let image = images
        .recv_timeout(WAIT)
        .expect("snapshot delivered")
        .expect("snapshot image");

    assert_eq!(image.dimensions(), (480, 640));
    assert_eq!(GpuLog::count(&custom_log.draws), 1);
    assert_eq!(GpuLog::count(&custom_log.drawer_releases), 1);
    assert_eq!(GpuLog::count(&log.draws), 1);
}

#[test]
fn blocking_calls_from_render_thread_are_rejected() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = Arc::new(start(&log, false));
    renderer.attach_surface(FakeSurface::new(1));

    let (tx, rx) = channel::bounded(1);
    let inner = Arc::clone(&renderer);
    let listener: Arc<dyn FrameListener> = Arc::new(move |_: Option<RgbaImage>| {
        let nobody: Arc<dyn FrameListener> = Arc::new(|_: Option<RgbaImage>| {});
        let _ = tx.send((inner.remove_snapshot_listener(&nobody), inner.shutdown()));
    });
    renderer.add_snapshot_listener(listener, 1.0, None, false);
    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));

    let (remove, shutdown) = rx.recv_timeout(WAIT).expect("listener ran");
    assert!(matches!(remove, Err(RenderError::InvalidThread { .. })));
    assert!(matches!(shutdown, Err(RenderError::InvalidThread { .. })));
    assert!(renderer.is_initialized());
    renderer.shutdown().expect("shutdown from caller thread");
}

#[test]
fn out_of_memory_is_reported_and_recovered() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    let (tx, errors) = channel::unbounded();
    let callback: Arc<dyn ErrorCallback> = Arc::new(move |err: &RenderError| {
        let _ = tx.send(err.clone());
    });
    renderer.set_error_callback(Some(callback));
    renderer.attach_surface(FakeSurface::new(1));
    barrier(&renderer);

    log.oom_next_draw.store(true, Ordering::SeqCst);
    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    let err = errors.recv_timeout(WAIT).expect("error reported");
    assert!(err.is_out_of_memory());
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.drawer_releases), 1);
    assert_eq!(GpuLog::count(&log.swaps), 0);

    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.draws), 1);
    assert_eq!(GpuLog::count(&log.swaps), 1);
    assert!(renderer.is_initialized());
    assert_eq!(frees.load(Ordering::SeqCst), 2);
}

#[test]
fn panicking_task_stops_the_renderer() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));

    log.panic_next_draw.store(true, Ordering::SeqCst);
    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));

    let deadline = Instant::now() + WAIT;
    while renderer.is_initialized() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!renderer.is_initialized());

    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    renderer.shutdown().expect("shutdown after panic");
    assert_eq!(GpuLog::count(&log.context_releases), 1);
    assert_eq!(frees.load(Ordering::SeqCst), 2);
}

#[derive(Default)]
struct RecordedEvents {
    first_frames: AtomicUsize,
    resolutions: Mutex<Vec<(u32, u32, Rotation)>>,
}

impl RendererEvents for RecordedEvents {
    fn on_first_frame_rendered(&self) {
        self.first_frames.fetch_add(1, Ordering::SeqCst);
    }

    fn on_frame_resolution_changed(&self, width: u32, height: u32, rotation: Rotation) {
        self.resolutions.lock().unwrap().push((width, height, rotation));
    }
}

#[test]
fn events_report_first_frame_and_resolution_changes() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    let events = Arc::new(RecordedEvents::default());
    renderer.set_renderer_events(Some(events.clone()));
    renderer.attach_surface(FakeSurface::new(1));

    renderer.submit_frame(frame(1280, 720, Rotation::Deg90, &frees));
    barrier(&renderer);
    renderer.submit_frame(frame(1280, 720, Rotation::Deg90, &frees));
    barrier(&renderer);
    renderer.submit_frame(frame(640, 480, Rotation::Deg0, &frees));
    barrier(&renderer);

    assert_eq!(events.first_frames.load(Ordering::SeqCst), 1);
    assert_eq!(
        *events.resolutions.lock().unwrap(),
        [(720, 1280, Rotation::Deg90), (640, 480, Rotation::Deg0)]
    );
}

#[test]
fn fps_reduction_updates_period() {
    let renderer = VideoRenderer::<FakeBackend>::new(config());
    assert_eq!(renderer.min_render_period_ns(), 0);

    renderer.set_fps_reduction(30.0);
    assert_eq!(renderer.min_render_period_ns(), 33_333_333);

    renderer.pause_video();
    assert_eq!(renderer.min_render_period_ns(), u64::MAX);

    renderer.disable_fps_reduction();
    assert_eq!(renderer.min_render_period_ns(), 0);
}

#[test]
fn half_rate_throttle_drops_every_other_frame() {
    const FRAME_INTERVAL_60FPS: Duration = Duration::from_nanos(16_666_667);

    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));
    barrier(&renderer);

    renderer.set_fps_reduction(30.0);
    let start_time = Instant::now();
    for i in 0..10 {
        sleep_until(start_time + FRAME_INTERVAL_60FPS * i);
        renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
        barrier(&renderer);
    }

    let stats = renderer.statistics();
    assert_eq!(stats.frames_received, 10);
    assert_eq!(stats.frames_rendered, 5);
    assert_eq!(stats.frames_dropped, 5);
    assert_eq!(GpuLog::count(&log.draws), 5);
    assert_eq!(frees.load(Ordering::SeqCst), 10);
}

#[test]
fn draw_rate_follows_min_render_period() {
    const PERIOD: Duration = Duration::from_millis(50);

    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));
    barrier(&renderer);

    let start_time = Instant::now();
    renderer.set_fps_reduction(20.0);
    while start_time.elapsed() < PERIOD * 6 {
        renderer.submit_frame(frame(16, 16, Rotation::Deg0, &frees));
        std::thread::sleep(Duration::from_millis(2));
    }
    barrier(&renderer);
    let expected = start_time.elapsed().as_secs_f64() / PERIOD.as_secs_f64();

    let draws = GpuLog::count(&log.draws);
    assert!(
        (draws as f64 - expected).abs() <= 1.0,
        "{draws} draws for {expected:.2} periods"
    );
    let stats = renderer.statistics();
    assert_eq!(stats.frames_rendered as usize, draws);
    assert_eq!(stats.frames_rendered + stats.frames_dropped, stats.frames_received);
}

#[test]
fn unpause_to_finite_fps_renders_once_then_throttles() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));
    renderer.pause_video();

    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.draws), 0);

    renderer.set_fps_reduction(1.0);
    assert_eq!(renderer.min_render_period_ns(), 1_000_000_000);
    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.draws), 1);

    renderer.submit_frame(frame(64, 64, Rotation::Deg0, &frees));
    barrier(&renderer);
    assert_eq!(GpuLog::count(&log.draws), 1);

    let stats = renderer.statistics();
    assert_eq!(stats.frames_received, 3);
    assert_eq!(stats.frames_rendered, 1);
    assert_eq!(stats.frames_dropped, 2);
    assert_eq!(frees.load(Ordering::SeqCst), 3);
}

#[test]
fn layout_aspect_and_mirror_reach_the_drawer() {
    let log = Arc::new(GpuLog::default());
    let frees = Arc::new(AtomicUsize::new(0));
    let renderer = start(&log, false);
    renderer.attach_surface(FakeSurface::new(1));

    renderer.submit_frame(frame(1280, 720, Rotation::Deg0, &frees));
    barrier(&renderer);
    let draw = log.last_draw().expect("drawn");
    assert_eq!(draw.frame_size, PhysicalSize::new(1280, 720));
    assert!(approx(draw.tex_matrix[0], 1.0), "{:?}", draw.tex_matrix);

    renderer.set_layout_aspect_ratio(1.0);
    renderer.submit_frame(frame(1280, 720, Rotation::Deg0, &frees));
    barrier(&renderer);
    let draw = log.last_draw().expect("drawn");
    assert_eq!(draw.frame_size, PhysicalSize::new(720, 720));
    assert!(approx(draw.tex_matrix[0], 0.5625), "{:?}", draw.tex_matrix);
    assert!(approx(draw.tex_matrix[12], 0.21875), "{:?}", draw.tex_matrix);

    renderer.set_mirror(true);
    renderer.submit_frame(frame(1280, 720, Rotation::Deg0, &frees));
    barrier(&renderer);
    let draw = log.last_draw().expect("drawn");
    assert_eq!(draw.frame_size, PhysicalSize::new(720, 720));
    assert!(approx(draw.tex_matrix[0], -0.5625), "{:?}", draw.tex_matrix);
    assert!(approx(draw.tex_matrix[12], 0.78125), "{:?}", draw.tex_matrix);
}
