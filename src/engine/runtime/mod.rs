//! ### English
//! Render runtime orchestration (public API).
//!
//! ### 中文
//! 渲染运行时编排（对外公开 API）。

mod command;
mod queue;
mod render_thread;
mod shared;

mod renderer;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

pub use renderer::VideoRenderer;
pub use shared::{ErrorCallback, RendererEvents};
