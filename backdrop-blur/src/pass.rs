//! Single filter pass.
//!
//! ## Usage
//!
//! Render one source view through a filter into a destination surface.

use crate::{backend::GpuBackend, surface::Surface};

/// Parameter block uploaded before every pass.
///
/// Layout matches `PassConstants` in `shaders/common.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassConstants {
    /// `0.5 / destination size` per axis.
    pub half_pixel: [f32; 2],
    /// Tap distance multiplier.
    pub offset: f32,
    /// Grain amplitude.
    pub noise: f32,
}

impl PassConstants {
    /// Builds the constants for a `width` x `height` destination.
    pub fn for_destination(width: u32, height: u32, offset: f32, noise: f32) -> Self {
        Self {
            half_pixel: [0.5 / width.max(1) as f32, 0.5 / height.max(1) as f32],
            offset,
            noise,
        }
    }
}

/// Runs individual filter passes against a backend.
pub struct PassExecutor {
    clear_color: [f32; 4],
}

impl PassExecutor {
    /// Creates an executor clearing each destination to `clear_color`.
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self { clear_color }
    }

    /// Filters `source` into `destination`.
    ///
    /// The input is unbound afterwards so the next pass may render into it.
    pub fn run<B: GpuBackend>(
        &self,
        backend: &mut B,
        destination: &Surface<B>,
        source: &B::ReadView,
        program: &B::Program,
        offset: f32,
        noise: f32,
    ) {
        backend.clear_target(destination.target(), self.clear_color);
        backend.bind_target(destination.target(), destination.viewport());
        backend.upload_constants(&PassConstants::for_destination(
            destination.width(),
            destination.height(),
            offset,
            noise,
        ));
        backend.bind_program(program);
        backend.bind_input_mirrored(source);
        backend.draw_fullscreen_quad();
        backend.unbind_input();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::Viewport,
        filter::{FilterKind, FilterPrograms},
        testing::{SoftBackend, SoftCall},
    };

    #[test]
    fn test_constants_layout() {
        assert_eq!(std::mem::size_of::<PassConstants>(), 16);
        let constants = PassConstants::for_destination(200, 100, 2.0, 0.5);
        assert_eq!(constants.half_pixel, [0.0025, 0.005]);
        assert_eq!(constants.offset, 2.0);
        assert_eq!(constants.noise, 0.5);
    }

    #[test]
    fn test_pass_call_order() {
        let mut backend = SoftBackend::new();
        let programs = FilterPrograms::compile(&mut backend).unwrap();
        let source = Surface::create(&mut backend, 8, 8).unwrap();
        let destination = Surface::create(&mut backend, 4, 4).unwrap();
        backend.clear_calls();

        PassExecutor::new([1.0; 4]).run(
            &mut backend,
            &destination,
            source.view(),
            programs.get(FilterKind::Downsample),
            2.0,
            0.0,
        );

        let target = destination.view().id();
        let input = source.view().id();
        assert_eq!(
            backend.calls(),
            &[
                SoftCall::Clear {
                    target,
                    color: [1.0; 4]
                },
                SoftCall::BindTarget {
                    target,
                    viewport: Viewport::full(4, 4)
                },
                SoftCall::UploadConstants(PassConstants::for_destination(4, 4, 2.0, 0.0)),
                SoftCall::BindProgram(FilterKind::Downsample),
                SoftCall::BindInput(input),
                SoftCall::Draw {
                    target,
                    source: input,
                    kind: FilterKind::Downsample
                },
                SoftCall::UnbindInput,
            ]
        );
    }
}
