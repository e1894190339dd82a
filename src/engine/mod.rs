/// ### English
/// Engine internal modules (render thread, draw pipeline, frames, throttling and statistics).
///
/// ### 中文
/// 引擎内部模块（渲染线程、绘制管线、帧、节流与统计等）。
pub mod config;
pub mod error;
pub mod frame;
pub mod layout;
pub mod matrix;
pub mod rendering;
pub mod runtime;
pub mod snapshot;
pub mod statistics;
pub(crate) mod throttle;
