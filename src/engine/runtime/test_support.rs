//! Recording fake backend for render-thread tests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dpi::PhysicalSize;

use crate::engine::config::SurfaceConfig;
use crate::engine::error::RenderError;
use crate::engine::frame::{BufferContent, VideoFrameBuffer};
use crate::engine::rendering::{
    GlDrawer, Gpu, GraphicsBackend, GraphicsContext, PixelFormat, Viewport,
};

/// Arguments of one drawer call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DrawCall {
    pub(crate) tex_matrix: [f32; 16],
    pub(crate) frame_size: PhysicalSize<u32>,
}

#[derive(Debug, Default)]
pub(crate) struct GpuLog {
    pub(crate) draws: AtomicUsize,
    pub(crate) swaps: AtomicUsize,
    pub(crate) clears: AtomicUsize,
    pub(crate) surfaces_created: AtomicUsize,
    pub(crate) surfaces_released: AtomicUsize,
    pub(crate) context_releases: AtomicUsize,
    pub(crate) drawer_releases: AtomicUsize,
    pub(crate) oom_next_draw: AtomicBool,
    pub(crate) panic_next_draw: AtomicBool,
    pub(crate) current_surface: Mutex<Option<u32>>,
    pub(crate) last_timestamp: Mutex<Option<i64>>,
    pub(crate) viewports: Mutex<Vec<Viewport>>,
    pub(crate) drawn: Mutex<Vec<DrawCall>>,
    next_object: AtomicU32,
}

impl GpuLog {
    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub(crate) fn current_surface(&self) -> Option<u32> {
        *self.current_surface.lock().unwrap()
    }

    pub(crate) fn last_timestamp(&self) -> Option<i64> {
        *self.last_timestamp.lock().unwrap()
    }

    pub(crate) fn last_viewport(&self) -> Option<Viewport> {
        self.viewports.lock().unwrap().last().copied()
    }

    pub(crate) fn last_draw(&self) -> Option<DrawCall> {
        self.drawn.lock().unwrap().last().copied()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeGpu {
    log: Arc<GpuLog>,
}

impl Gpu for FakeGpu {
    type Texture = u32;
    type Framebuffer = u32;

    fn texture_from_raw(&self, id: u32) -> Result<u32, RenderError> {
        Ok(id)
    }

    fn create_texture(&self) -> Result<u32, RenderError> {
        Ok(self.log.next_object.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn upload_texture(
        &self,
        _texture: u32,
        format: PixelFormat,
        size: PhysicalSize<u32>,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let expected = size.width as usize * size.height as usize * format.bytes_per_pixel();
        assert_eq!(data.len(), expected, "upload of a mis-packed plane");
        Ok(())
    }

    fn allocate_texture(&self, _texture: u32, _size: PhysicalSize<u32>) -> Result<(), RenderError> {
        Ok(())
    }

    fn delete_texture(&self, _texture: u32) {}

    fn create_framebuffer(&self, _texture: u32) -> Result<u32, RenderError> {
        Ok(self.log.next_object.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn bind_framebuffer(&self, _framebuffer: Option<u32>) {}

    fn delete_framebuffer(&self, _framebuffer: u32) {}

    fn viewport(&self, viewport: Viewport) {
        self.log.viewports.lock().unwrap().push(viewport);
    }

    fn clear(&self, _rgba: [f32; 4]) {
        self.log.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn read_pixels(&self, size: PhysicalSize<u32>) -> Result<Vec<u8>, RenderError> {
        Ok(vec![0; size.width as usize * size.height as usize * 4])
    }

    fn prepare_pixel_store(&self) {}

    fn use_default_program(&self) {}

    fn check_error(&self, _operation: &str) -> Result<(), RenderError> {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct FakeSurface {
    pub(crate) id: u32,
    pub(crate) size: PhysicalSize<u32>,
}

impl FakeSurface {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            size: PhysicalSize::new(1280, 720),
        }
    }
}

pub(crate) struct FakeContext {
    log: Arc<GpuLog>,
    surface: Option<FakeSurface>,
}

impl GraphicsContext for FakeContext {
    type Gpu = FakeGpu;
    type Surface = FakeSurface;

    fn gpu(&self) -> FakeGpu {
        FakeGpu {
            log: Arc::clone(&self.log),
        }
    }

    fn create_surface(&mut self, surface: FakeSurface) -> Result<(), RenderError> {
        self.log.surfaces_created.fetch_add(1, Ordering::SeqCst);
        *self.log.current_surface.lock().unwrap() = Some(surface.id);
        self.surface = Some(surface);
        Ok(())
    }

    fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    fn surface_size(&self) -> PhysicalSize<u32> {
        self.surface
            .as_ref()
            .map_or(PhysicalSize::new(0, 0), |surface| surface.size)
    }

    fn make_current(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn detach_current(&mut self) {}

    fn swap_buffers(&mut self, presentation_time_ns: Option<i64>) -> Result<(), RenderError> {
        self.log.swaps.fetch_add(1, Ordering::SeqCst);
        *self.log.last_timestamp.lock().unwrap() = presentation_time_ns;
        Ok(())
    }

    fn release_surface(&mut self) {
        if self.surface.take().is_some() {
            self.log.surfaces_released.fetch_add(1, Ordering::SeqCst);
            *self.log.current_surface.lock().unwrap() = None;
        }
    }

    fn release(&mut self) {
        self.release_surface();
        self.log.context_releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeBackend {
    pub(crate) log: Arc<GpuLog>,
    pub(crate) fail_create: bool,
}

impl FakeBackend {
    pub(crate) fn new(log: &Arc<GpuLog>) -> Self {
        Self {
            log: Arc::clone(log),
            fail_create: false,
        }
    }
}

impl GraphicsBackend for FakeBackend {
    type Context = FakeContext;
    type SharedContext = ();

    fn create_context(
        self,
        _shared: Option<()>,
        _config: &SurfaceConfig,
    ) -> Result<FakeContext, RenderError> {
        if self.fail_create {
            return Err(RenderError::Backend("no display".to_string()));
        }
        Ok(FakeContext {
            log: self.log,
            surface: None,
        })
    }
}

pub(crate) struct FakeDrawer {
    log: Arc<GpuLog>,
}

impl FakeDrawer {
    pub(crate) fn boxed(log: &Arc<GpuLog>) -> Box<dyn GlDrawer<FakeGpu>> {
        Box::new(Self {
            log: Arc::clone(log),
        })
    }

    fn draw(
        &self,
        gpu: &FakeGpu,
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        if self.log.panic_next_draw.swap(false, Ordering::SeqCst) {
            panic!("injected draw panic");
        }
        if self.log.oom_next_draw.swap(false, Ordering::SeqCst) {
            return Err(RenderError::GraphicsOutOfMemory {
                operation: "FakeDrawer.draw".to_string(),
            });
        }
        gpu.viewport(viewport);
        self.log.drawn.lock().unwrap().push(DrawCall {
            tex_matrix: *tex_matrix,
            frame_size,
        });
        self.log.draws.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl GlDrawer<FakeGpu> for FakeDrawer {
    fn draw_oes(
        &mut self,
        gpu: &FakeGpu,
        _texture: u32,
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        self.draw(gpu, tex_matrix, frame_size, viewport)
    }

    fn draw_rgb(
        &mut self,
        gpu: &FakeGpu,
        _texture: u32,
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        self.draw(gpu, tex_matrix, frame_size, viewport)
    }

    fn draw_yuv(
        &mut self,
        gpu: &FakeGpu,
        _planes: [u32; 3],
        tex_matrix: &[f32; 16],
        frame_size: PhysicalSize<u32>,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        self.draw(gpu, tex_matrix, frame_size, viewport)
    }

    fn release(&mut self, _gpu: &FakeGpu) {
        self.log.drawer_releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Solid RGBA buffer that counts how often it is freed.
pub(crate) struct TrackedBuffer {
    size: PhysicalSize<u32>,
    pixels: Vec<u8>,
    frees: Arc<AtomicUsize>,
}

impl TrackedBuffer {
    pub(crate) fn new(width: u32, height: u32, frees: &Arc<AtomicUsize>) -> Self {
        Self {
            size: PhysicalSize::new(width, height),
            pixels: vec![0x80; width as usize * height as usize * 4],
            frees: Arc::clone(frees),
        }
    }
}

impl VideoFrameBuffer for TrackedBuffer {
    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }

    fn content(&self) -> BufferContent<'_> {
        BufferContent::Rgba {
            data: &self.pixels,
            stride: self.size.width as usize * 4,
        }
    }
}

impl Drop for TrackedBuffer {
    fn drop(&mut self) {
        self.frees.fetch_add(1, Ordering::SeqCst);
    }
}
