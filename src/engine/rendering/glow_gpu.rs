//! ### English
//! [`Gpu`] implementation on top of `glow`.
//!
//! ### 中文
//! 基于 `glow` 的 [`Gpu`] 实现。

use std::num::NonZeroU32;
use std::sync::Arc;

use dpi::PhysicalSize;
use glow::HasContext as _;

use crate::engine::error::RenderError;

use super::backend::{Gpu, PixelFormat, Viewport};

/// ### English
/// `GL_LUMINANCE` (GLES 2 single-channel format).
///
/// ### 中文
/// `GL_LUMINANCE`（GLES 2 单通道格式）。
const LUMINANCE: u32 = 0x1909;

/// ### English
/// Shared glow GL API handle (cheap clone of an `Arc`).
///
/// The embedder builds the `glow::Context` from its platform loader when creating the
/// graphics context, then hands it out through `GraphicsContext::gpu`.
///
/// ### 中文
/// 共享的 glow GL API 句柄（`Arc` 的低成本 clone）。
///
/// 宿主在创建图形上下文时使用平台加载器构建 `glow::Context`，再通过 `GraphicsContext::gpu` 提供。
#[derive(Clone)]
pub struct GlowGpu {
    gl: Arc<glow::Context>,
}

impl GlowGpu {
    pub fn new(gl: Arc<glow::Context>) -> Self {
        Self { gl }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn gl_size(size: PhysicalSize<u32>) -> (i32, i32) {
    (
        i32::try_from(size.width).unwrap_or(i32::MAX),
        i32::try_from(size.height).unwrap_or(i32::MAX),
    )
}

impl Gpu for GlowGpu {
    type Texture = glow::NativeTexture;
    type Framebuffer = glow::NativeFramebuffer;

    fn texture_from_raw(&self, id: u32) -> Result<Self::Texture, RenderError> {
        NonZeroU32::new(id)
            .map(glow::NativeTexture)
            .ok_or_else(|| RenderError::Backend("texture name 0 is not a texture".to_string()))
    }

    fn create_texture(&self) -> Result<Self::Texture, RenderError> {
        let gl = &self.gl;
        unsafe {
            let texture = gl.create_texture().map_err(RenderError::Backend)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(texture)
        }
    }

    fn upload_texture(
        &self,
        texture: Self::Texture,
        format: PixelFormat,
        size: PhysicalSize<u32>,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let expected = size.width as usize * size.height as usize * format.bytes_per_pixel();
        if data.len() < expected {
            return Err(RenderError::Backend(format!(
                "upload of {}x{} needs {expected} bytes, got {}",
                size.width,
                size.height,
                data.len()
            )));
        }
        let gl_format = match format {
            PixelFormat::Rgba => glow::RGBA,
            PixelFormat::Luminance => LUMINANCE,
        };
        let (width, height) = gl_size(size);
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_format as i32,
                width,
                height,
                0,
                gl_format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&data[..expected])),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.check_error("upload_texture")
    }

    fn allocate_texture(
        &self,
        texture: Self::Texture,
        size: PhysicalSize<u32>,
    ) -> Result<(), RenderError> {
        let (width, height) = gl_size(size);
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(None),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.check_error("allocate_texture")
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    fn create_framebuffer(&self, texture: Self::Texture) -> Result<Self::Framebuffer, RenderError> {
        let gl = &self.gl;
        unsafe {
            let framebuffer = gl.create_framebuffer().map_err(RenderError::Backend)?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                return Err(RenderError::Backend(format!(
                    "framebuffer not complete: 0x{status:x}"
                )));
            }
            Ok(framebuffer)
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) };
    }

    fn viewport(&self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width, viewport.height)
        };
    }

    fn clear(&self, rgba: [f32; 4]) {
        unsafe {
            self.gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn read_pixels(&self, size: PhysicalSize<u32>) -> Result<Vec<u8>, RenderError> {
        let (width, height) = gl_size(size);
        let mut pixels = vec![0u8; size.width as usize * size.height as usize * 4];
        unsafe {
            self.gl.read_pixels(
                0,
                0,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(&mut pixels)),
            );
        }
        self.check_error("read_pixels")?;
        Ok(pixels)
    }

    fn prepare_pixel_store(&self) {
        unsafe { self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1) };
    }

    fn use_default_program(&self) {
        unsafe { self.gl.use_program(None) };
    }

    fn check_error(&self, operation: &str) -> Result<(), RenderError> {
        match unsafe { self.gl.get_error() } {
            glow::NO_ERROR => Ok(()),
            glow::OUT_OF_MEMORY => Err(RenderError::GraphicsOutOfMemory {
                operation: operation.to_string(),
            }),
            code => Err(RenderError::Backend(format!(
                "{operation}: GL error 0x{code:x}"
            ))),
        }
    }
}
