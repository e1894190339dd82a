//! ### English
//! Construction-time configuration for a renderer and its graphics context.
//!
//! ### 中文
//! 渲染器及其图形上下文的构造期配置。

use std::time::Duration;

/// ### English
/// Default interval between two statistics log lines.
///
/// ### 中文
/// 两次统计日志之间的默认间隔。
pub const DEFAULT_STATISTICS_INTERVAL: Duration = Duration::from_secs(4);

/// ### English
/// Default time `initialize` waits for the render thread to create its context.
///
/// ### 中文
/// `initialize` 等待渲染线程创建上下文的默认超时时间。
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// ### English
/// Renderer-wide settings that do not change after construction.
///
/// ### 中文
/// 构造后不再变化的渲染器级配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// ### English
    /// Name prefixed to log lines and used for the render thread name.
    ///
    /// ### 中文
    /// 日志前缀，同时用于渲染线程命名。
    pub name: String,
    /// ### English
    /// Interval of the periodic statistics summary.
    ///
    /// ### 中文
    /// 周期性统计摘要的间隔。
    pub statistics_interval: Duration,
    /// ### English
    /// How long `initialize` blocks waiting for context creation before giving up.
    ///
    /// ### 中文
    /// `initialize` 等待上下文创建的最长阻塞时间。
    pub init_timeout: Duration,
}

impl RendererConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            statistics_interval: DEFAULT_STATISTICS_INTERVAL,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

/// ### English
/// Attributes requested from the backend when it creates the graphics context and surface.
///
/// ### 中文
/// 后端创建图形上下文与 surface 时所请求的属性。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// ### English
    /// Request an alpha channel on the surface.
    ///
    /// ### 中文
    /// 是否请求带 alpha 通道的 surface。
    pub alpha: bool,
    /// ### English
    /// Surface will be consumed by a video encoder (recordable config).
    ///
    /// ### 中文
    /// surface 将被视频编码器消费（可录制配置）。
    pub recordable: bool,
    /// ### English
    /// Requested GLES major version.
    ///
    /// ### 中文
    /// 请求的 GLES 主版本号。
    pub gles_major_version: u8,
}

impl SurfaceConfig {
    /// ### English
    /// RGB888 surface, no alpha.
    ///
    /// ### 中文
    /// RGB888 surface，无 alpha。
    pub const PLAIN: SurfaceConfig = SurfaceConfig {
        alpha: false,
        recordable: false,
        gles_major_version: 2,
    };

    /// ### English
    /// RGBA8888 surface.
    ///
    /// ### 中文
    /// RGBA8888 surface。
    pub const RGBA: SurfaceConfig = SurfaceConfig {
        alpha: true,
        recordable: false,
        gles_major_version: 2,
    };

    pub const RECORDABLE: SurfaceConfig = SurfaceConfig {
        alpha: false,
        recordable: true,
        gles_major_version: 2,
    };
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::PLAIN
    }
}
