//! ### English
//! Video frames and their pixel buffers.
//!
//! A [`VideoFrame`] is a move-only ownership handle. Each handle owns exactly one reference to
//! the underlying buffer: [`VideoFrame::retain`] creates another handle, [`VideoFrame::release`]
//! (or dropping the handle) gives one up, and the buffer itself is freed together with its last
//! handle. Since handles cannot be copied, a handle can only be released once.
//!
//! ### 中文
//! 视频帧及其像素缓冲。
//!
//! [`VideoFrame`] 是只能移动的所有权句柄。每个句柄恰好持有底层缓冲的一个引用：
//! [`VideoFrame::retain`] 生成新的句柄，[`VideoFrame::release`]（或直接 drop）归还一个引用，
//! 最后一个句柄释放时缓冲随之释放。句柄不可复制，因此同一个句柄只可能被释放一次。

mod slot;

pub(crate) use slot::FrameSlot;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dpi::PhysicalSize;

use crate::engine::matrix::Matrix;

/// ### English
/// Source of unique frame identities (0 is never handed out).
///
/// ### 中文
/// 帧唯一标识的来源（不会分配 0）。
static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// ### English
/// Clockwise rotation that must be applied to the buffer for upright display.
///
/// ### 中文
/// 正确显示所需的顺时针旋转角度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// ### English
    /// Parses a rotation in degrees; only multiples of 90 (including negative ones) are valid.
    ///
    /// ### 中文
    /// 解析以度为单位的旋转；仅接受 90 的整数倍（允许负值）。
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// ### English
    /// Returns whether the rotation swaps width and height.
    ///
    /// ### 中文
    /// 返回该旋转是否交换宽高。
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// ### English
/// Kind of GPU texture carried by a texture-backed buffer.
///
/// ### 中文
/// 纹理类缓冲所携带的 GPU 纹理类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// ### English
    /// External (OES) texture, typically filled by a hardware decoder.
    ///
    /// ### 中文
    /// 外部（OES）纹理，通常由硬件解码器写入。
    Oes,
    Rgb,
}

/// ### English
/// Borrowed view of a buffer's pixels, in one of the layouts the draw pipeline understands.
///
/// ### 中文
/// 缓冲像素的借用视图，使用绘制管线可识别的布局之一。
#[derive(Debug, Clone, Copy)]
pub enum BufferContent<'a> {
    /// ### English
    /// Packed RGBA8 rows, `stride` bytes apart.
    ///
    /// ### 中文
    /// 紧凑的 RGBA8 行，行间距为 `stride` 字节。
    Rgba { data: &'a [u8], stride: usize },
    /// ### English
    /// Planar YUV 4:2:0; chroma planes are `ceil(w/2) × ceil(h/2)`.
    ///
    /// ### 中文
    /// 平面 YUV 4:2:0；色度平面尺寸为 `ceil(w/2) × ceil(h/2)`。
    I420 {
        y: &'a [u8],
        u: &'a [u8],
        v: &'a [u8],
        stride_y: usize,
        stride_u: usize,
        stride_v: usize,
    },
    /// ### English
    /// Texture living in a context shared with the render thread, with its own texture
    /// coordinate transform.
    ///
    /// ### 中文
    /// 位于与渲染线程共享的上下文中的纹理，附带自身的纹理坐标变换。
    Texture {
        id: u32,
        kind: TextureKind,
        transform: Matrix,
    },
}

impl BufferContent<'_> {
    pub fn is_texture(&self) -> bool {
        matches!(self, BufferContent::Texture { .. })
    }
}

/// ### English
/// Pixel storage behind a [`VideoFrame`]. The buffer is dropped when its last frame handle is
/// released, which is where implementations return memory to their pool.
///
/// ### 中文
/// [`VideoFrame`] 背后的像素存储。最后一个帧句柄释放时缓冲被 drop，
/// 实现方可以在 `Drop` 中把内存归还给缓冲池。
pub trait VideoFrameBuffer: Send + Sync + 'static {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn content(&self) -> BufferContent<'_>;
}

/// ### English
/// Owned, tightly packed RGBA8 buffer.
///
/// ### 中文
/// 自持有、紧凑排列的 RGBA8 缓冲。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    size: PhysicalSize<u32>,
    data: Vec<u8>,
}

impl RgbaBuffer {
    /// ### English
    /// Returns `None` if `data` is not exactly `width × height × 4` bytes.
    ///
    /// ### 中文
    /// 若 `data` 长度不等于 `width × height × 4`，返回 `None`。
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        (data.len() == expected).then_some(Self {
            size: PhysicalSize::new(width, height),
            data,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        Self {
            size: PhysicalSize::new(width, height),
            data: rgba.repeat(pixels),
        }
    }
}

impl VideoFrameBuffer for RgbaBuffer {
    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }

    fn content(&self) -> BufferContent<'_> {
        BufferContent::Rgba {
            data: &self.data,
            stride: self.size.width as usize * 4,
        }
    }
}

/// ### English
/// Owned, tightly packed I420 buffer.
///
/// ### 中文
/// 自持有、紧凑排列的 I420 缓冲。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I420Buffer {
    size: PhysicalSize<u32>,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl I420Buffer {
    pub fn chroma_size(width: u32, height: u32) -> PhysicalSize<u32> {
        PhysicalSize::new(width.div_ceil(2), height.div_ceil(2))
    }

    /// ### English
    /// Returns `None` if any plane has the wrong length.
    ///
    /// ### 中文
    /// 任一平面长度不匹配时返回 `None`。
    pub fn new(width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Option<Self> {
        let chroma = Self::chroma_size(width, height);
        let luma_len = (width as usize) * (height as usize);
        let chroma_len = (chroma.width as usize) * (chroma.height as usize);
        if y.len() != luma_len || u.len() != chroma_len || v.len() != chroma_len {
            return None;
        }
        Some(Self {
            size: PhysicalSize::new(width, height),
            y,
            u,
            v,
        })
    }

    /// ### English
    /// Solid-color buffer, handy for placeholders.
    ///
    /// ### 中文
    /// 纯色缓冲，可用作占位帧。
    pub fn filled(width: u32, height: u32, yuv: [u8; 3]) -> Self {
        let chroma = Self::chroma_size(width, height);
        let luma_len = (width as usize) * (height as usize);
        let chroma_len = (chroma.width as usize) * (chroma.height as usize);
        Self {
            size: PhysicalSize::new(width, height),
            y: vec![yuv[0]; luma_len],
            u: vec![yuv[1]; chroma_len],
            v: vec![yuv[2]; chroma_len],
        }
    }
}

impl VideoFrameBuffer for I420Buffer {
    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }

    fn content(&self) -> BufferContent<'_> {
        let chroma = Self::chroma_size(self.size.width, self.size.height);
        BufferContent::I420 {
            y: &self.y,
            u: &self.u,
            v: &self.v,
            stride_y: self.size.width as usize,
            stride_u: chroma.width as usize,
            stride_v: chroma.width as usize,
        }
    }
}

/// ### English
/// Buffer wrapping a texture owned by another context sharing objects with the render thread.
///
/// ### 中文
/// 包装一个纹理的缓冲，该纹理属于与渲染线程共享对象的另一个上下文。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureBuffer {
    pub size: PhysicalSize<u32>,
    pub texture_id: u32,
    pub kind: TextureKind,
    pub transform: Matrix,
}

impl VideoFrameBuffer for TextureBuffer {
    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }

    fn content(&self) -> BufferContent<'_> {
        BufferContent::Texture {
            id: self.texture_id,
            kind: self.kind,
            transform: self.transform,
        }
    }
}

/// ### English
/// One decoded video image: buffer reference, rotation and presentation timestamp.
///
/// ### 中文
/// 一帧解码后的视频图像：缓冲引用、旋转角度以及呈现时间戳。
pub struct VideoFrame {
    /// ### English
    /// Identity shared by every handle retained from the same frame.
    ///
    /// ### 中文
    /// 同一帧 retain 出来的所有句柄共享的标识。
    id: u64,
    buffer: Arc<dyn VideoFrameBuffer>,
    rotation: Rotation,
    timestamp_ns: i64,
}

impl VideoFrame {
    pub fn new(buffer: impl VideoFrameBuffer, rotation: Rotation, timestamp_ns: i64) -> Self {
        Self::from_shared(Arc::new(buffer), rotation, timestamp_ns)
    }

    /// ### English
    /// Wraps a buffer that is already shared with other holders.
    ///
    /// ### 中文
    /// 包装一个已被其他持有者共享的缓冲。
    pub fn from_shared(
        buffer: Arc<dyn VideoFrameBuffer>,
        rotation: Rotation,
        timestamp_ns: i64,
    ) -> Self {
        Self {
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            buffer,
            rotation,
            timestamp_ns,
        }
    }

    /// ### English
    /// Takes one more reference to the same frame.
    ///
    /// ### 中文
    /// 对同一帧再持有一个引用。
    #[must_use = "a retained frame must be handed off or released"]
    pub fn retain(&self) -> VideoFrame {
        Self {
            id: self.id,
            buffer: Arc::clone(&self.buffer),
            rotation: self.rotation,
            timestamp_ns: self.timestamp_ns,
        }
    }

    /// ### English
    /// Gives up this handle's reference. Equivalent to dropping the handle.
    ///
    /// ### 中文
    /// 归还该句柄持有的引用，等价于直接 drop。
    pub fn release(self) {}

    /// ### English
    /// Number of live handles sharing the buffer (diagnostics only).
    ///
    /// ### 中文
    /// 当前共享该缓冲的句柄数量（仅用于诊断）。
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn buffer(&self) -> &dyn VideoFrameBuffer {
        &*self.buffer
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn rotated_width(&self) -> u32 {
        if self.rotation.is_transposed() {
            self.buffer.height()
        } else {
            self.buffer.width()
        }
    }

    pub fn rotated_height(&self) -> u32 {
        if self.rotation.is_transposed() {
            self.buffer.width()
        } else {
            self.buffer.height()
        }
    }

    pub fn rotated_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.rotated_width(), self.rotated_height())
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("id", &self.id)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("rotation", &self.rotation)
            .field("timestamp_ns", &self.timestamp_ns)
            .finish()
    }
}
