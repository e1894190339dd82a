//! ### English
//! Layout math: how a frame is fitted into the surface, and how an embedder sizes the view.
//!
//! ### 中文
//! 布局计算：帧如何适配到 surface，以及宿主如何确定视图尺寸。

use std::sync::{Mutex, MutexGuard, PoisonError};

use dpi::PhysicalSize;

use crate::engine::matrix::Matrix;

/// ### English
/// Visible fraction used by [`ScalingType::AspectBalanced`].
///
/// ### 中文
/// [`ScalingType::AspectBalanced`] 使用的最小可见比例。
const BALANCED_VISIBLE_FRACTION: f32 = 0.5625;

/// ### English
/// How the video fills the available layout area.
///
/// ### 中文
/// 视频如何填充可用布局区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingType {
    /// ### English
    /// Whole frame visible, letterboxed.
    ///
    /// ### 中文
    /// 整帧可见，留黑边。
    #[default]
    AspectFit,
    /// ### English
    /// Layout fully covered, frame cropped.
    ///
    /// ### 中文
    /// 布局被完全覆盖，帧被裁剪。
    AspectFill,
    /// ### English
    /// Compromise between fit and fill.
    ///
    /// ### 中文
    /// 介于 fit 与 fill 之间的折中。
    AspectBalanced,
}

impl ScalingType {
    /// ### English
    /// Minimum fraction of the frame that must stay visible.
    ///
    /// ### 中文
    /// 帧必须保持可见的最小比例。
    pub fn min_visible_fraction(self) -> f32 {
        match self {
            ScalingType::AspectFit => 1.0,
            ScalingType::AspectFill => 0.0,
            ScalingType::AspectBalanced => BALANCED_VISIBLE_FRACTION,
        }
    }
}

/// ### English
/// Largest size within `max_size` that keeps at least `min_visible_fraction` of a video with
/// aspect ratio `video_aspect` visible.
///
/// A zero fraction or zero aspect means "fill everything" and returns `max_size` unchanged.
///
/// ### 中文
/// 在 `max_size` 范围内、且保证宽高比为 `video_aspect` 的视频至少有 `min_visible_fraction`
/// 可见的最大尺寸。
///
/// 比例或宽高比为 0 时表示“全部填满”，直接返回 `max_size`。
pub fn display_size(
    min_visible_fraction: f32,
    video_aspect: f32,
    max_size: PhysicalSize<u32>,
) -> PhysicalSize<u32> {
    if min_visible_fraction == 0.0 || video_aspect == 0.0 {
        return max_size;
    }
    let max_w = max_size.width as f32;
    let max_h = max_size.height as f32;
    let width = (max_h / min_visible_fraction * video_aspect).round();
    let height = (max_w / min_visible_fraction / video_aspect).round();
    PhysicalSize::new(
        clamp_to(width, max_size.width),
        clamp_to(height, max_size.height),
    )
}

fn clamp_to(value: f32, max: u32) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= max as f32 {
        max
    } else {
        value as u32
    }
}

/// ### English
/// One axis of a measure request from the embedder's layout system.
///
/// ### 中文
/// 宿主布局系统测量请求中的单个维度约束。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSpec {
    /// ### English
    /// The view must be exactly this size.
    ///
    /// ### 中文
    /// 视图必须恰好为该尺寸。
    Exactly(u32),
    AtMost(u32),
}

impl DimensionSpec {
    fn size(self) -> u32 {
        match self {
            DimensionSpec::Exactly(size) | DimensionSpec::AtMost(size) => size,
        }
    }

    fn is_exact(self) -> bool {
        matches!(self, DimensionSpec::Exactly(_))
    }
}

/// ### English
/// Measures the view size for a frame, with separate scaling types for frames whose
/// orientation matches the layout and for frames that do not.
///
/// ### 中文
/// 为帧测量视图尺寸；帧方向与布局一致和不一致时可分别使用不同的缩放方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutMeasure {
    match_orientation: ScalingType,
    mismatch_orientation: ScalingType,
}

impl LayoutMeasure {
    pub fn new(match_orientation: ScalingType, mismatch_orientation: ScalingType) -> Self {
        Self {
            match_orientation,
            mismatch_orientation,
        }
    }

    pub fn set_scaling_type(&mut self, scaling_type: ScalingType) {
        self.match_orientation = scaling_type;
        self.mismatch_orientation = scaling_type;
    }

    pub fn set_scaling_types(&mut self, matching: ScalingType, mismatching: ScalingType) {
        self.match_orientation = matching;
        self.mismatch_orientation = mismatching;
    }

    /// ### English
    /// Computes the measured view size.
    ///
    /// #### Parameters
    /// - `width` / `height`: Layout constraints.
    /// - `frame`: Rotated frame size (zero while no frame has arrived).
    ///
    /// ### 中文
    /// 计算视图的测量尺寸。
    ///
    /// #### 参数
    /// - `width` / `height`：布局约束。
    /// - `frame`：旋转后的帧尺寸（尚无帧时为 0）。
    pub fn measure(
        &self,
        width: DimensionSpec,
        height: DimensionSpec,
        frame: PhysicalSize<u32>,
    ) -> PhysicalSize<u32> {
        let max_size = PhysicalSize::new(width.size(), height.size());
        if frame.width == 0 || frame.height == 0 || max_size.width == 0 || max_size.height == 0 {
            return max_size;
        }

        let frame_aspect = frame.width as f32 / frame.height as f32;
        let display_aspect = max_size.width as f32 / max_size.height as f32;
        let scaling_type = if (frame_aspect > 1.0) == (display_aspect > 1.0) {
            self.match_orientation
        } else {
            self.mismatch_orientation
        };

        let mut size = display_size(scaling_type.min_visible_fraction(), frame_aspect, max_size);
        if width.is_exact() {
            size.width = max_size.width;
        }
        if height.is_exact() {
            size.height = max_size.height;
        }
        size
    }
}

/// ### English
/// Scale factors that fit a frame of aspect `frame_aspect` into a layout of aspect
/// `layout_aspect` by cropping the longer axis.
///
/// ### 中文
/// 将宽高比为 `frame_aspect` 的帧适配到宽高比为 `layout_aspect` 的布局时的缩放系数
/// （裁剪较长的一轴）。
pub(crate) fn aspect_fit_scale(frame_aspect: f32, layout_aspect: f32) -> (f32, f32) {
    if frame_aspect > layout_aspect {
        (layout_aspect / frame_aspect, 1.0)
    } else {
        (1.0, frame_aspect / layout_aspect)
    }
}

/// ### English
/// Producer-side presentation settings read by the render thread on every draw.
///
/// ### 中文
/// 生产者侧设置的呈现参数，渲染线程在每次绘制时读取。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct LayoutSettings {
    pub(crate) mirror_horizontally: bool,
    pub(crate) mirror_vertically: bool,
    /// ### English
    /// `0.0` follows the frame aspect ratio.
    ///
    /// ### 中文
    /// `0.0` 表示跟随帧的宽高比。
    pub(crate) layout_aspect_ratio: f32,
}

impl LayoutSettings {
    fn mirror_scale(&self) -> (f32, f32) {
        (
            if self.mirror_horizontally { -1.0 } else { 1.0 },
            if self.mirror_vertically { -1.0 } else { 1.0 },
        )
    }

    /// ### English
    /// Transform applied when drawing a frame with rotated aspect `frame_aspect` to the surface.
    ///
    /// ### 中文
    /// 将旋转后宽高比为 `frame_aspect` 的帧绘制到 surface 时使用的变换。
    pub(crate) fn draw_matrix(&self, frame_aspect: f32) -> Matrix {
        let layout_aspect = if self.layout_aspect_ratio != 0.0 {
            self.layout_aspect_ratio
        } else {
            frame_aspect
        };
        let (scale_x, scale_y) = aspect_fit_scale(frame_aspect, layout_aspect);
        let (mirror_x, mirror_y) = self.mirror_scale();

        let mut matrix = Matrix::IDENTITY;
        matrix.pre_translate(0.5, 0.5);
        matrix.pre_scale(mirror_x, mirror_y);
        matrix.pre_scale(scale_x, scale_y);
        matrix.pre_translate(-0.5, -0.5);
        matrix
    }

    /// ### English
    /// Transform used for snapshots: uncropped, flipped vertically so the read-back rows come
    /// out top-down.
    ///
    /// ### 中文
    /// 快照使用的变换：不裁剪，并做垂直翻转，使读回的像素行自上而下排列。
    pub(crate) fn snapshot_matrix(&self) -> Matrix {
        let (mirror_x, mirror_y) = self.mirror_scale();

        let mut matrix = Matrix::IDENTITY;
        matrix.pre_translate(0.5, 0.5);
        matrix.pre_scale(mirror_x, mirror_y);
        matrix.pre_scale(1.0, -1.0);
        matrix.pre_translate(-0.5, -0.5);
        matrix
    }
}

/// ### English
/// Lock wrapper so the setters never wait on the render thread.
///
/// ### 中文
/// 锁封装：设置接口无需等待渲染线程。
#[derive(Debug, Default)]
pub(crate) struct SharedLayout {
    settings: Mutex<LayoutSettings>,
}

impl SharedLayout {
    fn lock(&self) -> MutexGuard<'_, LayoutSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self) -> LayoutSettings {
        *self.lock()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut LayoutSettings)) {
        f(&mut self.lock());
    }
}
