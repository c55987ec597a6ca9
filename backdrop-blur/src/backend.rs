//! Device collaborator contract.
//!
//! ## Usage
//!
//! Implement [`GpuBackend`] to run the blur on a graphics API.

use crate::{error::BackendError, filter::FilterKind, pass::PassConstants};

/// Destination rectangle of a filter pass, in target pixels.
///
/// Depth range is always `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Returns a viewport covering a `width` x `height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Read view of the current screen contents plus its size.
#[derive(Clone, Debug)]
pub struct ScreenCapture<V> {
    /// View the first pass samples from.
    pub view: V,
    /// Screen width in pixels.
    pub width: u32,
    /// Screen height in pixels.
    pub height: u32,
}

/// Graphics operations the blur needs from the host renderer.
///
/// All handles are opaque to the core. Calls arrive on the render thread in
/// submission order; implementations may batch them until [`flush`](Self::flush).
pub trait GpuBackend {
    /// Owned texture storage.
    type Texture;
    /// View used to render into a texture.
    type TargetView;
    /// View used to sample a texture.
    type ReadView: Clone;
    /// Compiled filter program.
    type Program;
    /// Snapshot of the host render state mutated by a blur.
    type RenderState;

    /// Creates an RGBA8 texture usable as both render target and sampled input.
    fn create_texture(&mut self, width: u32, height: u32) -> Result<Self::Texture, BackendError>;

    /// Creates the write view of `texture`.
    fn create_target_view(
        &mut self,
        texture: &Self::Texture,
    ) -> Result<Self::TargetView, BackendError>;

    /// Creates the read view of `texture`.
    fn create_read_view(&mut self, texture: &Self::Texture)
    -> Result<Self::ReadView, BackendError>;

    /// Releases a texture once every view of it is gone.
    fn release_texture(&mut self, texture: Self::Texture) {
        drop(texture);
    }

    /// Compiles the WGSL `source` of a filter program.
    fn compile_program(
        &mut self,
        kind: FilterKind,
        source: &str,
    ) -> Result<Self::Program, BackendError>;

    /// Captures the screen contents the blur reads from.
    ///
    /// Returns `None` when no screen target is available this frame.
    fn capture_screen(&mut self) -> Option<ScreenCapture<Self::ReadView>>;

    /// Captures the render state the blur is about to change.
    fn save_render_state(&mut self) -> Self::RenderState;

    /// Restores a state captured by [`save_render_state`](Self::save_render_state).
    fn restore_render_state(&mut self, state: Self::RenderState);

    /// Disables culling, scissoring and depth testing for the filter passes.
    fn bind_filter_state(&mut self);

    /// Clears `target` to `color`.
    fn clear_target(&mut self, target: &Self::TargetView, color: [f32; 4]);

    /// Makes `target` the active render target.
    fn bind_target(&mut self, target: &Self::TargetView, viewport: Viewport);

    /// Uploads the parameter block of the next draw.
    fn upload_constants(&mut self, constants: &PassConstants);

    /// Binds the filter program of the next draw.
    fn bind_program(&mut self, program: &Self::Program);

    /// Binds `source` as the only sampled input, with mirror-repeat addressing.
    fn bind_input_mirrored(&mut self, source: &Self::ReadView);

    /// Draws a quad covering the viewport.
    fn draw_fullscreen_quad(&mut self);

    /// Unbinds the sampled input.
    fn unbind_input(&mut self);

    /// Submits recorded work to the device.
    fn flush(&mut self) {}
}
