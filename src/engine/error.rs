//! ### English
//! Error taxonomy shared by the renderer handle, the render thread and the graphics backend.
//!
//! ### 中文
//! 渲染器句柄、渲染线程与图形后端共用的错误类型。

/// ### English
/// Errors surfaced by the renderer.
///
/// Misuse (double init, blocking calls from the render thread) is returned to the caller.
/// Graphics failures raised on the render thread are routed to the error callback instead.
///
/// ### 中文
/// 渲染器对外暴露的错误。
///
/// 误用（重复初始化、在渲染线程上发起阻塞调用）直接返回给调用方；
/// 渲染线程上产生的图形错误则交给错误回调处理。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("{name}: already initialized")]
    AlreadyInitialized { name: String },

    #[error("{operation} must not be called on the render thread")]
    InvalidThread { operation: &'static str },

    #[error("graphics backend out of memory during {operation}")]
    GraphicsOutOfMemory { operation: String },

    /// ### English
    /// Internal only: a frame arrived while no surface was attached. Counted, never returned.
    ///
    /// ### 中文
    /// 仅内部使用：帧到达时没有挂载 surface。只计数，不会返回给调用方。
    #[error("no surface attached")]
    NoSurface,

    #[error("renderer is not initialized")]
    NotInitialized,

    #[error("graphics backend error: {0}")]
    Backend(String),

    #[error("shader error: {0}")]
    Shader(String),

    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(String),

    #[error("timed out waiting for the render thread to create its graphics context")]
    InitTimeout,

    #[error("render thread exited before completing the request")]
    RenderThreadGone,
}

impl RenderError {
    /// ### English
    /// Returns whether the error came from the graphics backend running out of memory.
    ///
    /// ### 中文
    /// 返回该错误是否为图形后端内存不足。
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, RenderError::GraphicsOutOfMemory { .. })
    }
}
