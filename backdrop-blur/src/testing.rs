//! CPU reference backend for tests.
//!
//! ## Usage
//!
//! Run the full pass sequence without a GPU and inspect every backend call.
//!
//! [`SoftBackend`] stores RGBA8 images in memory, samples them bilinearly with
//! mirror-repeat addressing and evaluates the same tap tables and grain hash
//! as the WGSL programs. Failures can be injected per resource kind.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    backend::{GpuBackend, ScreenCapture, Viewport},
    error::BackendError,
    filter::{FilterKind, grain_offset, validate_wgsl},
    pass::PassConstants,
};

/// An RGBA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl SoftImage {
    /// Creates an image filled with `color`.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Creates an image from a per-pixel function.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[self.index(x, y)]
    }

    /// Returns all pixels in row-major order.
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let px = self.pixel(mirror(x, self.width), mirror(y, self.height));
        px.map(|channel| channel as f32 / 255.0)
    }

    /// Bilinear sample at normalized `(u, v)` with mirror-repeat addressing.
    fn sample_mirrored(&self, u: f32, v: f32) -> [f32; 4] {
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (ix, iy) = (x0 as i64, y0 as i64);

        let top = lerp(self.texel(ix, iy), self.texel(ix + 1, iy), fx);
        let bottom = lerp(self.texel(ix, iy + 1), self.texel(ix + 1, iy + 1), fx);
        lerp(top, bottom, fy)
    }
}

fn mirror(index: i64, size: u32) -> u32 {
    let size = i64::from(size.max(1));
    let period = size * 2;
    let wrapped = index.rem_euclid(period);
    let mirrored = if wrapped < size {
        wrapped
    } else {
        period - 1 - wrapped
    };
    mirrored as u32
}

fn lerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

fn quantize(color: [f32; 4]) -> [u8; 4] {
    color.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
}

type SharedImage = Arc<RwLock<SoftImage>>;

/// Texture owned by a [`SoftBackend`].
#[derive(Debug)]
pub struct SoftTexture {
    id: u32,
    image: SharedImage,
}

impl SoftTexture {
    /// Returns the texture id.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Write or read view of a [`SoftTexture`].
#[derive(Clone, Debug)]
pub struct SoftView {
    id: u32,
    image: SharedImage,
}

impl SoftView {
    /// Returns the id of the viewed texture.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns a copy of the viewed image.
    pub fn snapshot(&self) -> SoftImage {
        self.image.read().clone()
    }
}

/// State mutated by the blur and restored afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SoftRenderState {
    /// Bound render target.
    pub target: Option<u32>,
    /// Active viewport.
    pub viewport: Option<Viewport>,
    /// Bound program.
    pub program: Option<FilterKind>,
    /// Bound input.
    pub input: Option<u32>,
    /// Whether culling, scissor and depth are disabled.
    pub filter_state: bool,
}

/// A recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum SoftCall {
    /// Texture allocation.
    CreateTexture {
        /// New texture id.
        id: u32,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Texture release.
    ReleaseTexture(u32),
    /// Program compilation.
    CompileProgram(FilterKind),
    /// Screen capture request.
    CaptureScreen,
    /// Render state snapshot.
    SaveState,
    /// Render state restore.
    RestoreState,
    /// Filter raster state bind.
    BindFilterState,
    /// Target clear.
    Clear {
        /// Cleared texture.
        target: u32,
        /// Clear color.
        color: [f32; 4],
    },
    /// Target bind.
    BindTarget {
        /// Bound texture.
        target: u32,
        /// Viewport.
        viewport: Viewport,
    },
    /// Constant upload.
    UploadConstants(PassConstants),
    /// Program bind.
    BindProgram(FilterKind),
    /// Input bind.
    BindInput(u32),
    /// Full-screen draw.
    Draw {
        /// Destination texture.
        target: u32,
        /// Sampled texture.
        source: u32,
        /// Filter used.
        kind: FilterKind,
    },
    /// Input unbind.
    UnbindInput,
    /// Submission.
    Flush,
}

/// In-memory [`GpuBackend`] used by tests.
#[derive(Default)]
pub struct SoftBackend {
    next_id: u32,
    live: usize,
    screen: Option<SoftView>,
    state: SoftRenderState,
    target: Option<SoftView>,
    input: Option<SoftView>,
    constants: Option<PassConstants>,
    calls: Vec<SoftCall>,
    texture_budget: Option<usize>,
    fail_views: bool,
    fail_compile: Option<FilterKind>,
    noise_disabled: bool,
}

impl SoftBackend {
    /// Creates a backend with no screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend whose screen holds `image`.
    pub fn with_screen(image: SoftImage) -> Self {
        let mut backend = Self::new();
        backend.set_screen(image);
        backend
    }

    /// Replaces the screen contents.
    pub fn set_screen(&mut self, image: SoftImage) {
        let id = self.allocate_id();
        self.screen = Some(SoftView {
            id,
            image: Arc::new(RwLock::new(image)),
        });
    }

    /// Removes the screen so captures fail.
    pub fn remove_screen(&mut self) {
        self.screen = None;
    }

    /// Returns the screen view, if any.
    pub fn screen(&self) -> Option<&SoftView> {
        self.screen.as_ref()
    }

    /// Lets `remaining` more textures succeed, then fails every allocation.
    ///
    /// `None` removes the limit.
    pub fn fail_textures_after(&mut self, remaining: Option<usize>) {
        self.texture_budget = remaining;
    }

    /// Makes view creation fail.
    pub fn fail_views(&mut self, fail: bool) {
        self.fail_views = fail;
    }

    /// Makes compilation of `kind` fail.
    pub fn fail_compile(&mut self, kind: Option<FilterKind>) {
        self.fail_compile = kind;
    }

    /// Skips the grain path entirely, regardless of the uploaded amplitude.
    pub fn disable_noise(&mut self, disabled: bool) {
        self.noise_disabled = disabled;
    }

    /// Overwrites the current render state, as the host would before a callback.
    pub fn set_render_state(&mut self, state: SoftRenderState) {
        self.state = state;
    }

    /// Returns the current render state.
    pub fn render_state(&self) -> &SoftRenderState {
        &self.state
    }

    /// Returns every recorded call.
    pub fn calls(&self) -> &[SoftCall] {
        &self.calls
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Returns the recorded draws as `(target, source, kind)`.
    pub fn draws(&self) -> Vec<(u32, u32, FilterKind)> {
        self.calls
            .iter()
            .filter_map(|call| match *call {
                SoftCall::Draw {
                    target,
                    source,
                    kind,
                } => Some((target, source, kind)),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of textures created and not yet released.
    pub fn live_textures(&self) -> usize {
        self.live
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn draw(&self, target: &SoftView, input: &SoftView, constants: PassConstants, kind: FilterKind) {
        let viewport = self.state.viewport.unwrap_or(Viewport::full(0, 0));
        // Snapshot first: the source is never the target, but a read guard held
        // across the write lock would deadlock if it were.
        let source = input.snapshot();
        let mut destination = target.image.write();
        let x_end = (viewport.x + viewport.width).min(destination.width);
        let y_end = (viewport.y + viewport.height).min(destination.height);
        let [step_x, step_y] = constants.half_pixel.map(|half| half * constants.offset);

        for y in viewport.y..y_end {
            for x in viewport.x..x_end {
                let u = ((x - viewport.x) as f32 + 0.5) / viewport.width as f32;
                let v = ((y - viewport.y) as f32 + 0.5) / viewport.height as f32;
                let mut sum = [0.0_f32; 4];
                for tap in kind.taps() {
                    let sample = source
                        .sample_mirrored(u + tap.offset[0] * step_x, v + tap.offset[1] * step_y);
                    for (acc, channel) in sum.iter_mut().zip(sample) {
                        *acc += channel * tap.weight;
                    }
                }
                let mut color = sum.map(|channel| channel / kind.normalizer());
                if !self.noise_disabled {
                    let grain = grain_offset(x as f32, y as f32, constants.noise);
                    for channel in &mut color[..3] {
                        *channel += grain;
                    }
                }
                let index = destination.index(x, y);
                destination.pixels[index] = quantize(color);
            }
        }
    }
}

impl GpuBackend for SoftBackend {
    type Texture = SoftTexture;
    type TargetView = SoftView;
    type ReadView = SoftView;
    type Program = FilterKind;
    type RenderState = SoftRenderState;

    fn create_texture(&mut self, width: u32, height: u32) -> Result<SoftTexture, BackendError> {
        if let Some(budget) = self.texture_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::TextureCreation {
                    width,
                    height,
                    reason: "injected failure".to_owned(),
                });
            }
            *budget -= 1;
        }
        let id = self.allocate_id();
        self.live += 1;
        self.calls.push(SoftCall::CreateTexture { id, width, height });
        Ok(SoftTexture {
            id,
            image: Arc::new(RwLock::new(SoftImage::filled(width, height, [0; 4]))),
        })
    }

    fn create_target_view(&mut self, texture: &SoftTexture) -> Result<SoftView, BackendError> {
        self.create_read_view(texture)
    }

    fn create_read_view(&mut self, texture: &SoftTexture) -> Result<SoftView, BackendError> {
        if self.fail_views {
            return Err(BackendError::ViewCreation("injected failure".to_owned()));
        }
        Ok(SoftView {
            id: texture.id,
            image: Arc::clone(&texture.image),
        })
    }

    fn release_texture(&mut self, texture: SoftTexture) {
        self.live = self.live.saturating_sub(1);
        self.calls.push(SoftCall::ReleaseTexture(texture.id));
    }

    fn compile_program(
        &mut self,
        kind: FilterKind,
        source: &str,
    ) -> Result<FilterKind, BackendError> {
        self.calls.push(SoftCall::CompileProgram(kind));
        if self.fail_compile == Some(kind) {
            return Err(BackendError::ProgramCompilation {
                kind,
                reason: "injected failure".to_owned(),
            });
        }
        validate_wgsl(kind, source)?;
        Ok(kind)
    }

    fn capture_screen(&mut self) -> Option<ScreenCapture<SoftView>> {
        self.calls.push(SoftCall::CaptureScreen);
        let view = self.screen.clone()?;
        let (width, height) = {
            let image = view.image.read();
            (image.width, image.height)
        };
        Some(ScreenCapture {
            view,
            width,
            height,
        })
    }

    fn save_render_state(&mut self) -> SoftRenderState {
        self.calls.push(SoftCall::SaveState);
        self.state.clone()
    }

    fn restore_render_state(&mut self, state: SoftRenderState) {
        self.calls.push(SoftCall::RestoreState);
        self.state = state;
    }

    fn bind_filter_state(&mut self) {
        self.calls.push(SoftCall::BindFilterState);
        self.state.filter_state = true;
    }

    fn clear_target(&mut self, target: &SoftView, color: [f32; 4]) {
        self.calls.push(SoftCall::Clear {
            target: target.id,
            color,
        });
        let fill = quantize(color);
        target.image.write().pixels.fill(fill);
    }

    fn bind_target(&mut self, target: &SoftView, viewport: Viewport) {
        self.calls.push(SoftCall::BindTarget {
            target: target.id,
            viewport,
        });
        self.state.target = Some(target.id);
        self.state.viewport = Some(viewport);
        self.target = Some(target.clone());
    }

    fn upload_constants(&mut self, constants: &PassConstants) {
        self.calls.push(SoftCall::UploadConstants(*constants));
        self.constants = Some(*constants);
    }

    fn bind_program(&mut self, program: &FilterKind) {
        self.calls.push(SoftCall::BindProgram(*program));
        self.state.program = Some(*program);
    }

    fn bind_input_mirrored(&mut self, source: &SoftView) {
        self.calls.push(SoftCall::BindInput(source.id));
        self.state.input = Some(source.id);
        self.input = Some(source.clone());
    }

    fn draw_fullscreen_quad(&mut self) {
        let (Some(target), Some(input), Some(constants), Some(kind)) = (
            self.target.clone(),
            self.input.clone(),
            self.constants,
            self.state.program,
        ) else {
            return;
        };
        self.calls.push(SoftCall::Draw {
            target: target.id,
            source: input.id,
            kind,
        });
        self.draw(&target, &input, constants, kind);
    }

    fn unbind_input(&mut self) {
        self.calls.push(SoftCall::UnbindInput);
        self.state.input = None;
        self.input = None;
    }

    fn flush(&mut self) {
        self.calls.push(SoftCall::Flush);
    }
}
