/// ### English
/// `video_render_engine` crate root.
/// Renders asynchronously produced video frames onto a graphics surface from a dedicated render
/// thread, with fps throttling, statistics and downscaled snapshots. The implementation lives
/// under `engine`; the public API is re-exported here.
///
/// ### 中文
/// `video_render_engine` 的 crate 根。
/// 在独立渲染线程上把异步产生的视频帧渲染到图形 surface，支持 fps 节流、统计与缩小快照。
/// 实现位于 `engine` 模块，对外 API 在此重新导出。
mod engine;

pub use engine::config::{
    DEFAULT_INIT_TIMEOUT, DEFAULT_STATISTICS_INTERVAL, RendererConfig, SurfaceConfig,
};
pub use engine::error::RenderError;
pub use engine::frame::{
    BufferContent, I420Buffer, RgbaBuffer, Rotation, TextureBuffer, TextureKind, VideoFrame,
    VideoFrameBuffer,
};
pub use engine::layout::{DimensionSpec, LayoutMeasure, ScalingType, display_size};
pub use engine::matrix::Matrix;
pub use engine::rendering::{
    DrawerOf, GlDrawer, GlRectDrawer, GlowGpu, Gpu, GpuOf, GraphicsBackend, GraphicsContext,
    PixelFormat, SurfaceOf, Viewport,
};
pub use engine::runtime::{ErrorCallback, RendererEvents, VideoRenderer};
pub use engine::snapshot::FrameListener;
pub use engine::statistics::RenderStatistics;
