//! Off-screen render surfaces.
//!
//! ## Usage
//!
//! Allocate a texture together with its write and read views.

use crate::{
    backend::{GpuBackend, Viewport},
    error::BackendError,
};

/// A texture with its write view and read view.
///
/// The three handles are created together by [`Surface::create`] and released
/// together by [`Surface::release`]. A missing surface is modelled as
/// `Option<Surface<B>>`, never as a surface with missing parts.
pub struct Surface<B: GpuBackend> {
    texture: B::Texture,
    target: B::TargetView,
    view: B::ReadView,
    width: u32,
    height: u32,
}

impl<B: GpuBackend> Surface<B> {
    /// Allocates a `width` x `height` surface.
    ///
    /// If a view cannot be created the texture is released before the error is returned.
    pub fn create(backend: &mut B, width: u32, height: u32) -> Result<Self, BackendError> {
        let texture = backend.create_texture(width, height)?;
        let target = match backend.create_target_view(&texture) {
            Ok(target) => target,
            Err(err) => {
                backend.release_texture(texture);
                return Err(err);
            }
        };
        let view = match backend.create_read_view(&texture) {
            Ok(view) => view,
            Err(err) => {
                drop(target);
                backend.release_texture(texture);
                return Err(err);
            }
        };
        Ok(Self {
            texture,
            target,
            view,
            width,
            height,
        })
    }

    /// Drops both views and hands the texture back to the backend.
    pub fn release(self, backend: &mut B) {
        let Self {
            texture,
            target,
            view,
            ..
        } = self;
        drop(target);
        drop(view);
        backend.release_texture(texture);
    }

    /// Returns the write view.
    pub fn target(&self) -> &B::TargetView {
        &self.target
    }

    /// Returns the read view.
    pub fn view(&self) -> &B::ReadView {
        &self.view
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns a viewport covering the whole surface.
    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }
}

impl<B: GpuBackend> std::fmt::Debug for Surface<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Scales a screen extent, rounding to the nearest pixel and clamping to at least 1x1.
///
/// Every conversion from a display size to a surface size goes through here so
/// that equal inputs always produce equal keys.
pub fn scaled_extent(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scale_axis = |value: u32| -> u32 {
        let scaled = (value as f64 * scale as f64).round();
        if scaled < 1.0 {
            1
        } else if scaled >= u32::MAX as f64 {
            u32::MAX
        } else {
            scaled as u32
        }
    };
    (scale_axis(width), scale_axis(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SoftBackend, SoftCall};

    #[test]
    fn test_create_and_release() {
        let mut backend = SoftBackend::new();
        let surface = Surface::create(&mut backend, 64, 32).unwrap();
        assert_eq!(surface.extent(), (64, 32));
        assert_eq!(surface.viewport(), Viewport::full(64, 32));
        assert_eq!(backend.live_textures(), 1);
        surface.release(&mut backend);
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn test_view_failure_releases_texture() {
        let mut backend = SoftBackend::new();
        backend.fail_views(true);
        assert!(Surface::create(&mut backend, 8, 8).is_err());
        assert_eq!(backend.live_textures(), 0);
        assert!(
            backend
                .calls()
                .iter()
                .any(|call| matches!(call, SoftCall::ReleaseTexture(_)))
        );
    }

    #[test]
    fn test_scaled_extent_rounds_and_clamps() {
        assert_eq!(scaled_extent(800, 600, 1.0), (800, 600));
        assert_eq!(scaled_extent(801, 601, 0.5), (401, 301));
        assert_eq!(scaled_extent(3, 3, 0.1), (1, 1));
        assert_eq!(scaled_extent(0, 10, 1.0), (1, 10));
    }
}
