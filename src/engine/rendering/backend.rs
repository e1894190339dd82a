//! ### English
//! Graphics abstraction layer between the render thread and the platform.
//!
//! Context creation, surface attachment and buffer swapping are supplied by the embedder
//! ([`GraphicsBackend`] / [`GraphicsContext`]). Texture and framebuffer work goes through [`Gpu`],
//! and shader programs live behind [`GlDrawer`].
//!
//! ### 中文
//! 渲染线程与平台之间的图形抽象层。
//!
//! 上下文创建、surface 挂载与缓冲交换由宿主提供（[`GraphicsBackend`] / [`GraphicsContext`]）。
//! 纹理与 framebuffer 操作通过 [`Gpu`] 完成，shader 程序则封装在 [`GlDrawer`] 之后。

use std::fmt;

use dpi::PhysicalSize;

use crate::engine::config::SurfaceConfig;
use crate::engine::error::RenderError;

/// ### English
/// Viewport rectangle in surface pixels (origin bottom-left, as in GL).
///
/// ### 中文
/// surface 像素坐标下的视口矩形（与 GL 相同，原点在左下角）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    /// ### English
    /// Viewport covering a whole target of `size`.
    ///
    /// ### 中文
    /// 覆盖整个 `size` 目标的视口。
    pub fn full(size: PhysicalSize<u32>) -> Self {
        Self {
            x: 0,
            y: 0,
            width: i32::try_from(size.width).unwrap_or(i32::MAX),
            height: i32::try_from(size.height).unwrap_or(i32::MAX),
        }
    }
}

/// ### English
/// Layout of pixel data handed to [`Gpu::upload_texture`].
///
/// ### 中文
/// 传给 [`Gpu::upload_texture`] 的像素数据布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// ### English
    /// 4 bytes per pixel.
    ///
    /// ### 中文
    /// 每像素 4 字节。
    Rgba,
    /// ### English
    /// 1 byte per pixel, used for individual YUV planes.
    ///
    /// ### 中文
    /// 每像素 1 字节，用于单个 YUV 平面。
    Luminance,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Luminance => 1,
        }
    }
}

/// ### English
/// Texture and framebuffer operations on the current context.
///
/// Every method must be called on the render thread with the owning context current.
///
/// ### 中文
/// 针对当前上下文的纹理与 framebuffer 操作。
///
/// 所有方法都必须在渲染线程、且所属上下文为 current 时调用。
pub trait Gpu: Clone + 'static {
    type Texture: Copy + PartialEq + fmt::Debug;
    type Framebuffer: Copy + PartialEq + fmt::Debug;

    /// ### English
    /// Wraps a texture name created by another context that shares objects with this one.
    ///
    /// ### 中文
    /// 包装一个由共享对象的其他上下文创建的纹理名。
    fn texture_from_raw(&self, id: u32) -> Result<Self::Texture, RenderError>;

    fn create_texture(&self) -> Result<Self::Texture, RenderError>;

    /// ### English
    /// Uploads tightly packed pixels into `texture`, (re)allocating its storage.
    ///
    /// ### 中文
    /// 把紧凑排列的像素上传到 `texture`，并（重新）分配其存储。
    fn upload_texture(
        &self,
        texture: Self::Texture,
        format: PixelFormat,
        size: PhysicalSize<u32>,
        data: &[u8],
    ) -> Result<(), RenderError>;

    /// ### English
    /// Allocates uninitialized RGBA storage, used for render targets.
    ///
    /// ### 中文
    /// 分配未初始化的 RGBA 存储，用作渲染目标。
    fn allocate_texture(
        &self,
        texture: Self::Texture,
        size: PhysicalSize<u32>,
    ) -> Result<(), RenderError>;

    fn delete_texture(&self, texture: Self::Texture);

    /// ### English
    /// Creates a framebuffer with `texture` as its color attachment.
    ///
    /// ### 中文
    /// 创建以 `texture` 作为颜色附件的 framebuffer。
    fn create_framebuffer(&self, texture: Self::Texture) -> Result<Self::Framebuffer, RenderError>;

    /// ### English
    /// Binds `framebuffer`, or the surface's default framebuffer for `None`.
    ///
    /// ### 中文
    /// 绑定 `framebuffer`；传入 `None` 时绑定 surface 的默认 framebuffer。
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);

    fn viewport(&self, viewport: Viewport);

    fn clear(&self, rgba: [f32; 4]);

    /// ### English
    /// Reads RGBA8 pixels from the bound framebuffer, bottom row first.
    ///
    /// ### 中文
    /// 从当前绑定的 framebuffer 读取 RGBA8 像素（自底行开始）。
    fn read_pixels(&self, size: PhysicalSize<u32>) -> Result<Vec<u8>, RenderError>;

    /// ### English
    /// Sets the 1-byte unpack alignment CPU plane uploads rely on.
    ///
    /// ### 中文
    /// 设置 CPU 平面上传所依赖的 1 字节 unpack 对齐。
    fn prepare_pixel_store(&self);

    /// ### English
    /// Unbinds any program before the context is torn down.
    ///
    /// ### 中文
    /// 在销毁上下文前解绑当前 program。
    fn use_default_program(&self);

    /// ### English
    /// Converts a pending backend error into a [`RenderError`]; out-of-memory maps to
    /// [`RenderError::GraphicsOutOfMemory`].
    ///
    /// ### 中文
    /// 将后端挂起的错误转换为 [`RenderError`]；内存不足映射为 [`RenderError::GraphicsOutOfMemory`]。
    fn check_error(&self, operation: &str) -> Result<(), RenderError>;
}

/// ### English
/// Shader program set that draws one texture layout into the bound viewport.
///
/// `tex_matrix` is a column-major 4×4 texture-coordinate transform. `frame_size` is the
/// transformed frame size, for drawers that filter according to scale.
///
/// ### 中文
/// 将某种纹理布局绘制到当前视口的 shader 程序集合。
///
/// `tex_matrix` 为列优先的 4×4 纹理坐标变换。`frame_size` 为变换后的帧尺寸，
/// 供需要按缩放比例选择滤波方式的 drawer 使用。
pub trait GlDrawer<G: Gpu>: Send {
    fn draw_oes(
        &mut self,
        gpu: &G,
        texture: G::Texture,
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError>;

    fn draw_rgb(
        &mut self,
        gpu: &G,
        texture: G::Texture,
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError>;

    /// ### English
    /// Draws three luminance planes in Y, U, V order.
    ///
    /// ### 中文
    /// 按 Y、U、V 顺序绘制三个亮度平面。
    fn draw_yuv(
        &mut self,
        gpu: &G,
        planes: [G::Texture; 3],
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError>;

    /// ### English
    /// Frees GPU programs. The drawer may be used again afterwards and will rebuild them.
    ///
    /// ### 中文
    /// 释放 GPU program；释放后 drawer 仍可继续使用，会重新构建程序。
    fn release(&mut self, gpu: &G);
}

/// ### English
/// A platform rendering context with at most one target surface.
///
/// Created and used exclusively on the render thread.
///
/// ### 中文
/// 最多带一个目标 surface 的平台渲染上下文。
///
/// 仅在渲染线程上创建与使用。
pub trait GraphicsContext: 'static {
    type Gpu: Gpu;
    /// ### English
    /// Platform handle the embedder attaches (a native window, a texture-backed surface, ...).
    ///
    /// ### 中文
    /// 宿主挂载的平台句柄（原生窗口、基于纹理的 surface 等）。
    type Surface: Send + 'static;

    fn gpu(&self) -> Self::Gpu;

    fn create_surface(&mut self, surface: Self::Surface) -> Result<(), RenderError>;

    fn has_surface(&self) -> bool;

    fn surface_size(&self) -> PhysicalSize<u32>;

    fn make_current(&mut self) -> Result<(), RenderError>;

    fn detach_current(&mut self);

    /// ### English
    /// Presents the back buffer, forwarding the presentation timestamp when given.
    ///
    /// ### 中文
    /// 呈现后缓冲；若提供时间戳则一并传给平台。
    fn swap_buffers(&mut self, presentation_time_ns: Option<i64>) -> Result<(), RenderError>;

    fn release_surface(&mut self);

    fn release(&mut self);
}

/// ### English
/// Embedder-supplied factory that creates the context on the render thread.
///
/// ### 中文
/// 宿主提供的工厂，在渲染线程上创建上下文。
pub trait GraphicsBackend: Send + 'static {
    type Context: GraphicsContext;
    /// ### English
    /// Handle of another context to share objects (textures) with.
    ///
    /// ### 中文
    /// 用于共享对象（纹理）的其他上下文句柄。
    type SharedContext: Send + 'static;

    fn create_context(
        self,
        shared: Option<Self::SharedContext>,
        config: &SurfaceConfig,
    ) -> Result<Self::Context, RenderError>;
}

/// ### English
/// GPU handle type of backend `B`.
///
/// ### 中文
/// 后端 `B` 对应的 GPU 句柄类型。
pub type GpuOf<B> = <<B as GraphicsBackend>::Context as GraphicsContext>::Gpu;

/// ### English
/// Surface handle type of backend `B`.
///
/// ### 中文
/// 后端 `B` 对应的 surface 句柄类型。
pub type SurfaceOf<B> = <<B as GraphicsBackend>::Context as GraphicsContext>::Surface;

/// ### English
/// Owned drawer usable with backend `B`.
///
/// ### 中文
/// 可用于后端 `B` 的 drawer（拥有所有权）。
pub type DrawerOf<B> = Box<dyn GlDrawer<GpuOf<B>>>;
