//! Dual Kawase filter kernels.
//!
//! ## Usage
//!
//! Compile the downsample and upsample programs and evaluate the grain hash.
//!
//! Both programs share a WGSL prelude (`shaders/common.wgsl`) holding the
//! vertex stage, the parameter block layout and the noise function. The tap
//! tables below describe the same kernels for CPU implementations.

use std::fmt;

use crate::{backend::GpuBackend, error::BackendError};

const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
const DOWNSAMPLE_WGSL: &str = include_str!("shaders/downsample.wgsl");
const UPSAMPLE_WGSL: &str = include_str!("shaders/upsample.wgsl");

/// Scale applied to the centered grain value before it is added to a pixel.
pub const NOISE_STRENGTH: f32 = 0.3;

/// The two filters of the pass sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// 5-tap kernel used while shrinking.
    Downsample,
    /// 8-tap kernel used while growing.
    Upsample,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterKind::Downsample => "downsample",
            FilterKind::Upsample => "upsample",
        })
    }
}

/// One sample of a kernel.
///
/// `offset` is in units of `half_pixel * offset` from the pass constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tap {
    /// Tap position relative to the output pixel.
    pub offset: [f32; 2],
    /// Unnormalized weight.
    pub weight: f32,
}

const fn tap(x: f32, y: f32, weight: f32) -> Tap {
    Tap {
        offset: [x, y],
        weight,
    }
}

const DOWNSAMPLE_TAPS: [Tap; 5] = [
    tap(0.0, 0.0, 4.0),
    tap(-1.0, -1.0, 1.0),
    tap(1.0, 1.0, 1.0),
    tap(1.0, -1.0, 1.0),
    tap(-1.0, 1.0, 1.0),
];

const UPSAMPLE_TAPS: [Tap; 8] = [
    tap(-2.0, 0.0, 1.0),
    tap(-1.0, 1.0, 2.0),
    tap(0.0, 2.0, 1.0),
    tap(1.0, 1.0, 2.0),
    tap(2.0, 0.0, 1.0),
    tap(1.0, -1.0, 2.0),
    tap(0.0, -2.0, 1.0),
    tap(-1.0, -1.0, 2.0),
];

impl FilterKind {
    /// Returns the kernel taps.
    pub fn taps(self) -> &'static [Tap] {
        match self {
            FilterKind::Downsample => &DOWNSAMPLE_TAPS,
            FilterKind::Upsample => &UPSAMPLE_TAPS,
        }
    }

    /// Returns the divisor that normalizes the tap weights.
    pub fn normalizer(self) -> f32 {
        match self {
            FilterKind::Downsample => 8.0,
            FilterKind::Upsample => 12.0,
        }
    }

    /// Returns the complete WGSL module for this filter.
    ///
    /// The vertex entry point is `vs_main` and the fragment entry point is `fs_main`.
    pub fn source(self) -> String {
        let body = match self {
            FilterKind::Downsample => DOWNSAMPLE_WGSL,
            FilterKind::Upsample => UPSAMPLE_WGSL,
        };
        format!("{COMMON_WGSL}\n{body}")
    }
}

fn fract(value: f32) -> f32 {
    value - value.floor()
}

/// Evaluates the grain hash at integer pixel coordinates.
///
/// The result lies in `[0, 1)` and depends only on the pixel position, so the
/// grain is stable across frames.
pub fn grain(x: f32, y: f32) -> f32 {
    let a = fract((x * 12.9898 + y * 78.233).sin() * 43758.5453);
    let b = fract((x * 39.3468 + y * 11.1351).sin() * 24634.6345);
    (a + b) * 0.5
}

/// Returns the signed color perturbation the filters add at `(x, y)`.
///
/// Zero when `noise` is not positive.
pub fn grain_offset(x: f32, y: f32, noise: f32) -> f32 {
    if noise <= 0.0 {
        return 0.0;
    }
    (grain(x.floor(), y.floor()) - 0.5) * noise * NOISE_STRENGTH
}

/// The compiled downsample and upsample programs.
pub struct FilterPrograms<B: GpuBackend> {
    downsample: B::Program,
    upsample: B::Program,
}

impl<B: GpuBackend> FilterPrograms<B> {
    /// Compiles both programs.
    pub fn compile(backend: &mut B) -> Result<Self, BackendError> {
        let downsample =
            backend.compile_program(FilterKind::Downsample, &FilterKind::Downsample.source())?;
        let upsample =
            backend.compile_program(FilterKind::Upsample, &FilterKind::Upsample.source())?;
        Ok(Self {
            downsample,
            upsample,
        })
    }

    /// Returns the program of `kind`.
    pub fn get(&self, kind: FilterKind) -> &B::Program {
        match kind {
            FilterKind::Downsample => &self.downsample,
            FilterKind::Upsample => &self.upsample,
        }
    }
}

/// Parses and validates a WGSL module, returning readable diagnostics on failure.
pub fn validate_wgsl(kind: FilterKind, source: &str) -> Result<naga::Module, BackendError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| {
        BackendError::ProgramCompilation {
            kind,
            reason: err.emit_to_string(source),
        }
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| BackendError::ProgramCompilation {
        kind,
        reason: format!("{err:?}"),
    })?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_normalizer() {
        for kind in [FilterKind::Downsample, FilterKind::Upsample] {
            let sum: f32 = kind.taps().iter().map(|tap| tap.weight).sum();
            assert_eq!(sum, kind.normalizer(), "{kind}");
        }
    }

    #[test]
    fn test_kernels_are_symmetric() {
        for kind in [FilterKind::Downsample, FilterKind::Upsample] {
            for tap in kind.taps() {
                let mirrored = kind.taps().iter().find(|other| {
                    other.offset == [-tap.offset[0], -tap.offset[1]] && other.weight == tap.weight
                });
                assert!(mirrored.is_some(), "{kind} tap {tap:?} has no mirror");
            }
        }
    }

    #[test]
    fn test_shaders_validate() {
        for kind in [FilterKind::Downsample, FilterKind::Upsample] {
            let module = validate_wgsl(kind, &kind.source())
                .unwrap_or_else(|err| panic!("{kind} failed to validate: {err}"));
            let names: Vec<_> = module
                .entry_points
                .iter()
                .map(|entry| entry.name.as_str())
                .collect();
            assert!(names.contains(&"vs_main"));
            assert!(names.contains(&"fs_main"));
        }
    }

    #[test]
    fn test_invalid_source_is_reported() {
        let err = validate_wgsl(FilterKind::Upsample, "fn broken( {").unwrap_err();
        assert!(matches!(
            err,
            BackendError::ProgramCompilation {
                kind: FilterKind::Upsample,
                ..
            }
        ));
    }

    #[test]
    fn test_grain_is_deterministic_and_bounded() {
        for y in 0..16 {
            for x in 0..16 {
                let value = grain(x as f32, y as f32);
                assert!((0.0..1.0).contains(&value));
                assert_eq!(value, grain(x as f32, y as f32));
            }
        }
    }

    #[test]
    fn test_grain_offset_disabled_without_noise() {
        assert_eq!(grain_offset(3.0, 7.0, 0.0), 0.0);
        let amplitude = grain_offset(3.0, 7.0, 1.0).abs();
        assert!(amplitude <= 0.5 * NOISE_STRENGTH);
    }
}
