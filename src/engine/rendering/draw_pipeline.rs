//! ### English
//! Frame drawing: render matrix, CPU-buffer uploads and dispatch to the drawer.
//!
//! ### 中文
//! 帧绘制：计算渲染矩阵、上传 CPU 缓冲并分派给 drawer。

use dpi::PhysicalSize;
use tracing::warn;

use crate::engine::error::RenderError;
use crate::engine::frame::{BufferContent, I420Buffer, TextureKind, VideoFrame};
use crate::engine::matrix::Matrix;

use super::backend::{GlDrawer, Gpu, PixelFormat, Viewport};

/// ### English
/// Size of a frame of `frame_size` after `transform`, measured along the mapped unit edges.
///
/// ### 中文
/// 尺寸为 `frame_size` 的帧经 `transform` 变换后的尺寸（沿映射后的单位边测量）。
pub(crate) fn transformed_render_size(frame_size: PhysicalSize<u32>, transform: &Matrix) -> (i64, i64) {
    let origin = transform.map_point(0.0, 0.0);
    let x_edge = transform.map_point(1.0, 0.0);
    let y_edge = transform.map_point(0.0, 1.0);
    let width = edge_length(origin, x_edge) * frame_size.width as f32;
    let height = edge_length(origin, y_edge) * frame_size.height as f32;
    (width.round() as i64, height.round() as i64)
}

fn edge_length(from: (f32, f32), to: (f32, f32)) -> f32 {
    (to.0 - from.0).hypot(to.1 - from.1)
}

/// ### English
/// Copies `rows` rows of `row_bytes` each out of a strided plane into `out`, tightly packed.
///
/// ### 中文
/// 将带行距的平面中 `rows` 行（每行 `row_bytes` 字节）紧凑拷贝到 `out`。
fn pack_plane<'a>(
    data: &'a [u8],
    stride: usize,
    row_bytes: usize,
    rows: usize,
    out: &'a mut Vec<u8>,
) -> Result<&'a [u8], RenderError> {
    let needed = stride
        .saturating_mul(rows.saturating_sub(1))
        .saturating_add(row_bytes);
    if rows == 0 || row_bytes == 0 {
        return Ok(&data[..0]);
    }
    if stride < row_bytes || data.len() < needed {
        return Err(RenderError::Backend(format!(
            "plane too small: {} bytes, stride {stride}, {rows} rows of {row_bytes}",
            data.len()
        )));
    }
    if stride == row_bytes {
        return Ok(&data[..row_bytes * rows]);
    }
    out.clear();
    out.reserve(row_bytes * rows);
    for row in data.chunks(stride).take(rows) {
        out.extend_from_slice(&row[..row_bytes]);
    }
    Ok(out.as_slice())
}

/// ### English
/// Draws frames of any buffer kind with a [`GlDrawer`].
///
/// CPU buffers are uploaded once per frame; drawing the same frame again (for snapshots)
/// re-uses the uploaded textures.
///
/// ### 中文
/// 使用 [`GlDrawer`] 绘制任意缓冲类型的帧。
///
/// CPU 缓冲每帧只上传一次；同一帧再次绘制（用于快照）时复用已上传的纹理。
pub(crate) struct DrawPipeline<G: Gpu> {
    yuv_textures: Option<[G::Texture; 3]>,
    rgba_texture: Option<G::Texture>,
    /// ### English
    /// Identity of the frame whose pixels currently sit in the upload textures.
    ///
    /// ### 中文
    /// 当前上传纹理中像素所属帧的标识。
    uploaded_frame: Option<u64>,
    repack: Vec<u8>,
}

impl<G: Gpu> Default for DrawPipeline<G> {
    fn default() -> Self {
        Self {
            yuv_textures: None,
            rgba_texture: None,
            uploaded_frame: None,
            repack: Vec::new(),
        }
    }
}

impl<G: Gpu> DrawPipeline<G> {
    /// ### English
    /// Draws `frame` into `viewport`.
    ///
    /// #### Parameters
    /// - `additional`: Layout transform (crop, mirror, flip) applied on top of rotation.
    ///
    /// ### 中文
    /// 将 `frame` 绘制到 `viewport`。
    ///
    /// #### 参数
    /// - `additional`：在旋转之上附加的布局变换（裁剪、镜像、翻转）。
    pub(crate) fn draw_frame(
        &mut self,
        gpu: &G,
        frame: &VideoFrame,
        drawer: &mut dyn GlDrawer<G>,
        additional: &Matrix,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        let (render_width, render_height) =
            transformed_render_size(frame.rotated_size(), additional);
        if render_width <= 0 || render_height <= 0 {
            warn!("Illegal frame size: {render_width}x{render_height}");
            return Ok(());
        }
        let render_size = PhysicalSize::new(
            u32::try_from(render_width).unwrap_or(u32::MAX),
            u32::try_from(render_height).unwrap_or(u32::MAX),
        );

        let content = frame.buffer().content();
        let mut render_matrix = Matrix::IDENTITY;
        render_matrix.pre_translate(0.5, 0.5);
        if !content.is_texture() {
            // CPU rows are stored top-down; texture coordinates start at the bottom.
            render_matrix.pre_scale(1.0, -1.0);
        }
        render_matrix.pre_rotate(frame.rotation().degrees() as f32);
        render_matrix.pre_translate(-0.5, -0.5);
        render_matrix.pre_concat(additional);

        match content {
            BufferContent::Texture {
                id,
                kind,
                transform,
            } => {
                let mut final_matrix = transform;
                final_matrix.pre_concat(&render_matrix);
                let tex_matrix = final_matrix.to_gl_mat4();
                let texture = gpu.texture_from_raw(id)?;
                match kind {
                    TextureKind::Oes => {
                        drawer.draw_oes(gpu, texture, &tex_matrix, render_size, viewport)
                    }
                    TextureKind::Rgb => {
                        drawer.draw_rgb(gpu, texture, &tex_matrix, render_size, viewport)
                    }
                }
            }
            BufferContent::I420 { .. } => {
                let planes = self.upload_yuv(gpu, frame)?;
                drawer.draw_yuv(gpu, planes, &render_matrix.to_gl_mat4(), render_size, viewport)
            }
            BufferContent::Rgba { .. } => {
                let texture = self.upload_rgba(gpu, frame)?;
                drawer.draw_rgb(gpu, texture, &render_matrix.to_gl_mat4(), render_size, viewport)
            }
        }
    }

    fn upload_yuv(&mut self, gpu: &G, frame: &VideoFrame) -> Result<[G::Texture; 3], RenderError> {
        let planes = match self.yuv_textures {
            Some(planes) => planes,
            None => {
                let planes = [gpu.create_texture()?, gpu.create_texture()?, gpu.create_texture()?];
                self.yuv_textures = Some(planes);
                planes
            }
        };
        if self.uploaded_frame == Some(frame.id()) {
            return Ok(planes);
        }

        let BufferContent::I420 {
            y,
            u,
            v,
            stride_y,
            stride_u,
            stride_v,
        } = frame.buffer().content()
        else {
            return Err(RenderError::Backend("expected an I420 buffer".to_string()));
        };
        let luma = PhysicalSize::new(frame.width(), frame.height());
        let chroma = I420Buffer::chroma_size(frame.width(), frame.height());
        let sources = [(y, stride_y, luma), (u, stride_u, chroma), (v, stride_v, chroma)];

        self.uploaded_frame = None;
        for (texture, (data, stride, size)) in planes.into_iter().zip(sources) {
            let packed = pack_plane(
                data,
                stride,
                size.width as usize,
                size.height as usize,
                &mut self.repack,
            )?;
            gpu.upload_texture(texture, PixelFormat::Luminance, size, packed)?;
        }
        gpu.check_error("DrawPipeline.upload_yuv")?;
        self.uploaded_frame = Some(frame.id());
        Ok(planes)
    }

    fn upload_rgba(&mut self, gpu: &G, frame: &VideoFrame) -> Result<G::Texture, RenderError> {
        let texture = match self.rgba_texture {
            Some(texture) => texture,
            None => {
                let texture = gpu.create_texture()?;
                self.rgba_texture = Some(texture);
                texture
            }
        };
        if self.uploaded_frame == Some(frame.id()) {
            return Ok(texture);
        }

        let BufferContent::Rgba { data, stride } = frame.buffer().content() else {
            return Err(RenderError::Backend("expected an RGBA buffer".to_string()));
        };
        let size = PhysicalSize::new(frame.width(), frame.height());
        let row_bytes = size.width as usize * PixelFormat::Rgba.bytes_per_pixel();

        self.uploaded_frame = None;
        let packed = pack_plane(data, stride, row_bytes, size.height as usize, &mut self.repack)?;
        gpu.upload_texture(texture, PixelFormat::Rgba, size, packed)?;
        gpu.check_error("DrawPipeline.upload_rgba")?;
        self.uploaded_frame = Some(frame.id());
        Ok(texture)
    }

    /// ### English
    /// Frees the upload textures. The pipeline stays usable and re-creates them on demand.
    ///
    /// ### 中文
    /// 释放上传纹理。管线仍可继续使用，按需重新创建。
    pub(crate) fn release(&mut self, gpu: &G) {
        if let Some(planes) = self.yuv_textures.take() {
            for texture in planes {
                gpu.delete_texture(texture);
            }
        }
        if let Some(texture) = self.rgba_texture.take() {
            gpu.delete_texture(texture);
        }
        self.uploaded_frame = None;
        self.repack = Vec::new();
    }
}
