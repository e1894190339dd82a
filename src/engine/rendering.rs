//! ### English
//! Rendering module entry point.
//! Splits the backend traits, the context owner, the draw pipeline and the glow implementation
//! into submodules.
//!
//! ### 中文
//! 渲染模块入口。
//! 将后端 trait、上下文持有者、绘制管线以及 glow 实现拆分到子模块。

mod backend;
mod draw_pipeline;
mod glow_gpu;
mod rect_drawer;
mod surface_owner;
mod texture_framebuffer;

pub use backend::{
    DrawerOf, GlDrawer, Gpu, GpuOf, GraphicsBackend, GraphicsContext, PixelFormat, SurfaceOf,
    Viewport,
};
pub use glow_gpu::GlowGpu;
pub use rect_drawer::GlRectDrawer;

pub(crate) use draw_pipeline::DrawPipeline;
pub(crate) use surface_owner::GraphicsSurfaceOwner;
pub(crate) use texture_framebuffer::TextureFramebuffer;
