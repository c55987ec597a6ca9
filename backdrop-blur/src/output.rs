//! Persistent full-resolution output.
//!
//! ## Usage
//!
//! Hold the final blurred image the host composites behind its panels.

use tracing::debug;

use crate::{backend::GpuBackend, error::BackendError, surface::Surface};

/// Surface receiving the last pass of every blur.
pub struct OutputSurface<B: GpuBackend> {
    surface: Option<Surface<B>>,
    rebuilds: u64,
}

impl<B: GpuBackend> Default for OutputSurface<B> {
    fn default() -> Self {
        Self {
            surface: None,
            rebuilds: 0,
        }
    }
}

impl<B: GpuBackend> OutputSurface<B> {
    /// Returns a `width` x `height` surface, reallocating only when the size changed.
    ///
    /// The replacement is allocated before the current surface is released. If
    /// allocation fails the current surface, and its contents, are kept.
    pub fn ensure(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<&Surface<B>, BackendError> {
        let current = self.surface.as_ref().map(Surface::extent);
        if current != Some((width, height)) {
            let surface = Surface::create(backend, width, height)?;
            debug!("Output surface resized from {current:?} to {width}x{height}");
            if let Some(previous) = self.surface.replace(surface) {
                previous.release(backend);
            }
            self.rebuilds += 1;
        }
        self.surface
            .as_ref()
            .ok_or_else(|| BackendError::ViewCreation("output surface missing".to_owned()))
    }

    /// Returns the surface, if one has been allocated.
    pub fn surface(&self) -> Option<&Surface<B>> {
        self.surface.as_ref()
    }

    /// Returns the read view the host composites.
    pub fn texture(&self) -> Option<&B::ReadView> {
        self.surface.as_ref().map(Surface::view)
    }

    /// Returns how many times the surface has been (re)allocated.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Releases the surface.
    pub fn release(&mut self, backend: &mut B) {
        if let Some(surface) = self.surface.take() {
            surface.release(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SoftBackend;

    #[test]
    fn test_texture_absent_until_ensured() {
        let output = OutputSurface::<SoftBackend>::default();
        assert!(output.texture().is_none());
    }

    #[test]
    fn test_rebuild_only_on_size_change() {
        let mut backend = SoftBackend::new();
        let mut output = OutputSurface::default();
        output.ensure(&mut backend, 800, 600).unwrap();
        output.ensure(&mut backend, 800, 600).unwrap();
        assert_eq!(output.rebuilds(), 1);
        let surface = output.ensure(&mut backend, 1024, 768).unwrap();
        assert_eq!(surface.extent(), (1024, 768));
        assert_eq!(output.rebuilds(), 2);
        assert_eq!(backend.live_textures(), 1);
    }

    #[test]
    fn test_failed_resize_keeps_previous() {
        let mut backend = SoftBackend::new();
        let mut output = OutputSurface::default();
        output.ensure(&mut backend, 320, 240).unwrap();
        let before = output.texture().unwrap().id();

        backend.fail_textures_after(Some(0));
        assert!(output.ensure(&mut backend, 640, 480).is_err());
        let surface = output.surface().unwrap();
        assert_eq!(surface.extent(), (320, 240));
        assert_eq!(surface.view().id(), before);
    }
}
