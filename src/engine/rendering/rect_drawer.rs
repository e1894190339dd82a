//! ### English
//! Full-viewport quad drawer with RGB, external OES and I420 shader programs.
//!
//! ### 中文
//! 全视口四边形 drawer，带 RGB、外部 OES 与 I420 三种 shader 程序。

use dpi::PhysicalSize;
use glow::HasContext as _;

use crate::engine::error::RenderError;

use super::backend::{GlDrawer, Gpu as _, Viewport};
use super::glow_gpu::GlowGpu;

/// ### English
/// `GL_TEXTURE_EXTERNAL_OES`.
///
/// ### 中文
/// `GL_TEXTURE_EXTERNAL_OES`。
const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

const POSITION_ATTRIBUTE: u32 = 0;
const TEX_COORD_ATTRIBUTE: u32 = 1;

/// ### English
/// Interleaved `(x, y, u, v)` triangle strip covering the viewport.
///
/// ### 中文
/// 覆盖整个视口的交错 `(x, y, u, v)` 三角形带。
const QUAD_VERTICES: [f32; 16] = [
    -1.0, -1.0, 0.0, 0.0, //
    1.0, -1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, 1.0, //
    1.0, 1.0, 1.0, 1.0,
];

const VERTEX_SHADER: &str = "\
attribute vec4 in_pos;
attribute vec4 in_tc;
uniform mat4 tex_mat;
varying vec2 tc;
void main() {
  gl_Position = in_pos;
  tc = (tex_mat * in_tc).xy;
}
";

const RGB_FRAGMENT_SHADER: &str = "\
precision mediump float;
varying vec2 tc;
uniform sampler2D tex;
void main() {
  gl_FragColor = texture2D(tex, tc);
}
";

const OES_FRAGMENT_SHADER: &str = "\
#extension GL_OES_EGL_image_external : require
precision mediump float;
varying vec2 tc;
uniform samplerExternalOES tex;
void main() {
  gl_FragColor = texture2D(tex, tc);
}
";

const YUV_FRAGMENT_SHADER: &str = "\
precision mediump float;
varying vec2 tc;
uniform sampler2D y_tex;
uniform sampler2D u_tex;
uniform sampler2D v_tex;
void main() {
  float y = texture2D(y_tex, tc).r * 1.16438;
  float u = texture2D(u_tex, tc).r;
  float v = texture2D(v_tex, tc).r;
  gl_FragColor = vec4(
      y + 1.59603 * v - 0.874202,
      y - 0.391762 * u - 0.812968 * v + 0.531668,
      y + 2.01723 * u - 1.08563,
      1.0);
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShaderKind {
    Rgb,
    Oes,
    Yuv,
}

impl ShaderKind {
    fn index(self) -> usize {
        match self {
            ShaderKind::Rgb => 0,
            ShaderKind::Oes => 1,
            ShaderKind::Yuv => 2,
        }
    }

    fn fragment_source(self) -> &'static str {
        match self {
            ShaderKind::Rgb => RGB_FRAGMENT_SHADER,
            ShaderKind::Oes => OES_FRAGMENT_SHADER,
            ShaderKind::Yuv => YUV_FRAGMENT_SHADER,
        }
    }

    /// ### English
    /// Sampler uniforms in texture-unit order.
    ///
    /// ### 中文
    /// 按纹理单元顺序排列的 sampler uniform。
    fn samplers(self) -> &'static [&'static str] {
        match self {
            ShaderKind::Rgb | ShaderKind::Oes => &["tex"],
            ShaderKind::Yuv => &["y_tex", "u_tex", "v_tex"],
        }
    }

    fn texture_target(self) -> u32 {
        match self {
            ShaderKind::Oes => TEXTURE_EXTERNAL_OES,
            ShaderKind::Rgb | ShaderKind::Yuv => glow::TEXTURE_2D,
        }
    }
}

struct Program {
    program: glow::NativeProgram,
    tex_mat: Option<glow::NativeUniformLocation>,
}

/// ### English
/// Default [`GlDrawer`] for [`GlowGpu`]. Programs are compiled lazily on first use.
///
/// ### 中文
/// [`GlowGpu`] 的默认 [`GlDrawer`]。shader 程序在首次使用时惰性编译。
#[derive(Default)]
pub struct GlRectDrawer {
    programs: [Option<Program>; 3],
    vertex_buffer: Option<glow::NativeBuffer>,
}

impl GlRectDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_vertex_buffer(&mut self, gl: &glow::Context) -> Result<glow::NativeBuffer, RenderError> {
        if let Some(buffer) = self.vertex_buffer {
            return Ok(buffer);
        }
        let bytes: Vec<u8> = QUAD_VERTICES.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let buffer = unsafe {
            let buffer = gl.create_buffer().map_err(RenderError::Backend)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &bytes, glow::STATIC_DRAW);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            buffer
        };
        self.vertex_buffer = Some(buffer);
        Ok(buffer)
    }

    fn ensure_program(&mut self, gl: &glow::Context, kind: ShaderKind) -> Result<&Program, RenderError> {
        let slot = &mut self.programs[kind.index()];
        if slot.is_none() {
            *slot = Some(compile_program(gl, kind)?);
        }
        slot.as_ref()
            .ok_or_else(|| RenderError::Shader("program missing after compile".to_string()))
    }

    fn draw(
        &mut self,
        gpu: &GlowGpu,
        kind: ShaderKind,
        textures: &[glow::NativeTexture],
        tex_matrix: &[f32; 16],
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        let gl = gpu.gl();
        let vertex_buffer = self.ensure_vertex_buffer(gl)?;
        let program = self.ensure_program(gl, kind)?;
        let target = kind.texture_target();

        unsafe {
            gl.use_program(Some(program.program));
            gl.uniform_matrix_4_f32_slice(program.tex_mat.as_ref(), false, tex_matrix);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            gl.enable_vertex_attrib_array(POSITION_ATTRIBUTE);
            gl.vertex_attrib_pointer_f32(POSITION_ATTRIBUTE, 2, glow::FLOAT, false, 16, 0);
            gl.enable_vertex_attrib_array(TEX_COORD_ATTRIBUTE);
            gl.vertex_attrib_pointer_f32(TEX_COORD_ATTRIBUTE, 2, glow::FLOAT, false, 16, 8);

            for (unit, texture) in textures.iter().enumerate() {
                gl.active_texture(glow::TEXTURE0 + unit as u32);
                gl.bind_texture(target, Some(*texture));
            }

            gl.viewport(viewport.x, viewport.y, viewport.width, viewport.height);
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);

            for unit in (0..textures.len()).rev() {
                gl.active_texture(glow::TEXTURE0 + unit as u32);
                gl.bind_texture(target, None);
            }
            gl.disable_vertex_attrib_array(POSITION_ATTRIBUTE);
            gl.disable_vertex_attrib_array(TEX_COORD_ATTRIBUTE);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        gpu.check_error("GlRectDrawer.draw")
    }
}

fn compile_shader(gl: &glow::Context, shader_type: u32, source: &str) -> Result<glow::NativeShader, RenderError> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(RenderError::Shader)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RenderError::Shader(log));
        }
        Ok(shader)
    }
}

fn compile_program(gl: &glow::Context, kind: ShaderKind) -> Result<Program, RenderError> {
    let vertex = compile_shader(gl, glow::VERTEX_SHADER, VERTEX_SHADER)?;
    let fragment = match compile_shader(gl, glow::FRAGMENT_SHADER, kind.fragment_source()) {
        Ok(fragment) => fragment,
        Err(err) => {
            unsafe { gl.delete_shader(vertex) };
            return Err(err);
        }
    };

    unsafe {
        let program = match gl.create_program() {
            Ok(program) => program,
            Err(err) => {
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                return Err(RenderError::Shader(err));
            }
        };
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.bind_attrib_location(program, POSITION_ATTRIBUTE, "in_pos");
        gl.bind_attrib_location(program, TEX_COORD_ATTRIBUTE, "in_tc");
        gl.link_program(program);
        gl.detach_shader(program, vertex);
        gl.detach_shader(program, fragment);
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(RenderError::Shader(log));
        }

        gl.use_program(Some(program));
        for (unit, name) in kind.samplers().iter().enumerate() {
            let location = gl.get_uniform_location(program, name);
            gl.uniform_1_i32(location.as_ref(), unit as i32);
        }
        let tex_mat = gl.get_uniform_location(program, "tex_mat");
        gl.use_program(None);

        Ok(Program { program, tex_mat })
    }
}

impl GlDrawer<GlowGpu> for GlRectDrawer {
    fn draw_oes(
        &mut self,
        gpu: &GlowGpu,
        texture: glow::NativeTexture,
        tex_matrix: &[f32; 16],
        _frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        self.draw(gpu, ShaderKind::Oes, &[texture], tex_matrix, viewport)
    }

    fn draw_rgb(
        &mut self,
        gpu: &GlowGpu,
        texture: glow::NativeTexture,
        tex_matrix: &[f32; 16],
        _frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        self.draw(gpu, ShaderKind::Rgb, &[texture], tex_matrix, viewport)
    }

    fn draw_yuv(
        &mut self,
        gpu: &GlowGpu,
        planes: [glow::NativeTexture; 3],
        tex_matrix: &[f32; 16],
        _frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        self.draw(gpu, ShaderKind::Yuv, &planes, tex_matrix, viewport)
    }

    fn release(&mut self, gpu: &GlowGpu) {
        let gl = gpu.gl();
        unsafe {
            for program in self.programs.iter_mut().filter_map(Option::take) {
                gl.delete_program(program.program);
            }
            if let Some(buffer) = self.vertex_buffer.take() {
                gl.delete_buffer(buffer);
            }
        }
    }
}
