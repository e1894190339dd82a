use dpi::PhysicalSize;

use crate::engine::error::RenderError;

use super::backend::Gpu;

/// ### English
/// Offscreen RGBA render target used for snapshot read-back.
///
/// GPU objects are created lazily on the first [`Self::set_size`] and the texture storage is
/// reallocated only when the size changes.
///
/// ### 中文
/// 用于快照读回的离屏 RGBA 渲染目标。
///
/// GPU 对象在第一次 [`Self::set_size`] 时惰性创建；仅当尺寸变化时才重新分配纹理存储。
pub(crate) struct TextureFramebuffer<G: Gpu> {
    texture: Option<G::Texture>,
    framebuffer: Option<G::Framebuffer>,
    size: PhysicalSize<u32>,
}

impl<G: Gpu> Default for TextureFramebuffer<G> {
    fn default() -> Self {
        Self {
            texture: None,
            framebuffer: None,
            size: PhysicalSize::new(0, 0),
        }
    }
}

impl<G: Gpu> TextureFramebuffer<G> {
    pub(crate) fn set_size(&mut self, gpu: &G, size: PhysicalSize<u32>) -> Result<(), RenderError> {
        if size.width == 0 || size.height == 0 {
            return Err(RenderError::Backend(format!(
                "invalid framebuffer size {}x{}",
                size.width, size.height
            )));
        }
        if self.framebuffer.is_some() && size == self.size {
            return Ok(());
        }

        let texture = match self.texture {
            Some(texture) => texture,
            None => {
                let texture = gpu.create_texture()?;
                self.texture = Some(texture);
                texture
            }
        };
        gpu.allocate_texture(texture, size)?;
        gpu.check_error("TextureFramebuffer.set_size")?;

        if self.framebuffer.is_none() {
            self.framebuffer = Some(gpu.create_framebuffer(texture)?);
        }
        self.size = size;
        Ok(())
    }

    pub(crate) fn bind(&self, gpu: &G) {
        gpu.bind_framebuffer(self.framebuffer);
    }

    /// ### English
    /// Reads the whole target as RGBA8 rows, bottom row first.
    ///
    /// ### 中文
    /// 以 RGBA8 行读取整个目标（自底行开始）。
    pub(crate) fn read(&self, gpu: &G) -> Result<Vec<u8>, RenderError> {
        gpu.bind_framebuffer(self.framebuffer);
        let pixels = gpu.read_pixels(self.size);
        gpu.bind_framebuffer(None);
        let pixels = pixels?;
        gpu.check_error("TextureFramebuffer.read")?;
        Ok(pixels)
    }

    pub(crate) fn release(&mut self, gpu: &G) {
        if let Some(framebuffer) = self.framebuffer.take() {
            gpu.delete_framebuffer(framebuffer);
        }
        if let Some(texture) = self.texture.take() {
            gpu.delete_texture(texture);
        }
        self.size = PhysicalSize::new(0, 0);
    }
}
