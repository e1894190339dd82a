//! ### English
//! 3×3 texture-coordinate transform used by the draw pipeline.
//!
//! Values are stored row-major. The `pre_*` operations post-multiply (`self = self · op`), so a
//! chain of `pre_*` calls reads in the order the transforms are applied to a point, last first.
//!
//! ### 中文
//! 绘制管线使用的 3×3 纹理坐标变换矩阵。
//!
//! 数值按行优先存储。`pre_*` 操作为右乘（`self = self · op`），因此一串 `pre_*` 调用中，
//! 越靠后的变换越先作用于点。

const SNAP_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    values: [f32; 9],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        values: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    /// ### English
    /// Builds a matrix from row-major values.
    ///
    /// ### 中文
    /// 由行优先数值构造矩阵。
    pub const fn from_row_major(values: [f32; 9]) -> Self {
        Self { values }
    }

    pub fn values(&self) -> [f32; 9] {
        self.values
    }

    pub fn reset(&mut self) {
        *self = Self::IDENTITY;
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// ### English
    /// `self = self · other`.
    ///
    /// ### 中文
    /// `self = self · other`。
    pub fn pre_concat(&mut self, other: &Matrix) {
        *self = multiply(self, other);
    }

    /// ### English
    /// `self = other · self`.
    ///
    /// ### 中文
    /// `self = other · self`。
    pub fn post_concat(&mut self, other: &Matrix) {
        *self = multiply(other, self);
    }

    pub fn pre_translate(&mut self, dx: f32, dy: f32) {
        self.pre_concat(&Matrix::from_row_major([
            1.0, 0.0, dx, //
            0.0, 1.0, dy, //
            0.0, 0.0, 1.0,
        ]));
    }

    pub fn pre_scale(&mut self, sx: f32, sy: f32) {
        self.pre_concat(&Matrix::from_row_major([
            sx, 0.0, 0.0, //
            0.0, sy, 0.0, //
            0.0, 0.0, 1.0,
        ]));
    }

    /// ### English
    /// Rotates by `degrees` around the origin. Quarter turns are exact.
    ///
    /// ### 中文
    /// 绕原点旋转 `degrees` 度；90 度整数倍的旋转结果是精确的。
    pub fn pre_rotate(&mut self, degrees: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let sin = snap(sin);
        let cos = snap(cos);
        self.pre_concat(&Matrix::from_row_major([
            cos, -sin, 0.0, //
            sin, cos, 0.0, //
            0.0, 0.0, 1.0,
        ]));
    }

    /// ### English
    /// Maps one point through the matrix (with perspective divide).
    ///
    /// ### 中文
    /// 用该矩阵映射一个点（含透视除法）。
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let v = &self.values;
        let mx = v[0] * x + v[1] * y + v[2];
        let my = v[3] * x + v[4] * y + v[5];
        let w = v[6] * x + v[7] * y + v[8];
        if w == 0.0 || w == 1.0 {
            (mx, my)
        } else {
            (mx / w, my / w)
        }
    }

    /// ### English
    /// Expands to a column-major 4×4 matrix suitable for a `mat4` shader uniform.
    /// The z axis is left untouched.
    ///
    /// ### 中文
    /// 展开为列优先的 4×4 矩阵，可直接作为 shader 的 `mat4` uniform。
    /// z 轴保持不变。
    pub fn to_gl_mat4(&self) -> [f32; 16] {
        let v = &self.values;
        [
            v[0], v[3], 0.0, v[6], //
            v[1], v[4], 0.0, v[7], //
            0.0, 0.0, 1.0, 0.0, //
            v[2], v[5], 0.0, v[8],
        ]
    }
}

fn snap(value: f32) -> f32 {
    if value.abs() < SNAP_EPSILON { 0.0 } else { value }
}

fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let a = &a.values;
    let b = &b.values;
    let mut out = [0.0f32; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] = a[row * 3] * b[col]
                + a[row * 3 + 1] * b[3 + col]
                + a[row * 3 + 2] * b[6 + col];
        }
    }
    Matrix::from_row_major(out)
}
