//! Per-invocation blur parameters.
//!
//! ## Usage
//!
//! Describe how strong a single backdrop blur request should be.

use crate::error::BlurError;

/// Unvalidated request passed to [`BackdropBlur::process`](crate::BackdropBlur::process).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlurSettings {
    /// Number of downsample steps. Each step halves the working resolution.
    pub iterations: u32,
    /// Sample tap distance in half-pixels of the destination level.
    pub offset: f32,
    /// Grain amplitude, `0.0` disables it.
    pub noise: f32,
    /// Base resolution as a fraction of the captured screen, in `(0, 1]`.
    pub scale: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            iterations: 2,
            offset: 2.0,
            noise: 0.0,
            scale: 1.0,
        }
    }
}

impl BlurSettings {
    /// Sets the iteration count.
    #[must_use]
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the sample offset.
    #[must_use]
    pub fn offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the noise amplitude.
    #[must_use]
    pub fn noise(mut self, noise: f32) -> Self {
        self.noise = noise;
        self
    }

    /// Sets the resolution scale.
    #[must_use]
    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

/// Validated, immutable parameters of one scheduled blur.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurParameters {
    iterations: u32,
    offset: f32,
    noise: f32,
    scale: f32,
}

impl BlurParameters {
    /// Validates `settings` against `max_iterations`.
    pub fn new(settings: BlurSettings, max_iterations: u32) -> Result<Self, BlurError> {
        let BlurSettings {
            iterations,
            offset,
            noise,
            scale,
        } = settings;
        if iterations > max_iterations {
            return Err(BlurError::TooManyIterations {
                iterations,
                max: max_iterations,
            });
        }
        if !offset.is_finite() {
            return Err(BlurError::InvalidOffset(offset));
        }
        if !noise.is_finite() || noise < 0.0 {
            return Err(BlurError::InvalidNoise(noise));
        }
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(BlurError::InvalidScale(scale));
        }
        Ok(Self {
            iterations,
            offset,
            noise,
            scale,
        })
    }

    /// Returns the number of downsample steps.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Returns the sample offset.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Returns the noise amplitude.
    pub fn noise(&self) -> f32 {
        self.noise
    }

    /// Returns the resolution scale.
    pub fn scale(&self) -> f32 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = BlurParameters::new(BlurSettings::default(), 16).unwrap();
        assert_eq!(params.iterations(), 2);
        assert_eq!(params.offset(), 2.0);
        assert_eq!(params.noise(), 0.0);
        assert_eq!(params.scale(), 1.0);
    }

    #[test]
    fn test_zero_iterations_allowed() {
        assert!(BlurParameters::new(BlurSettings::default().iterations(0), 16).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let base = BlurSettings::default();
        assert!(matches!(
            BlurParameters::new(base.iterations(17), 16),
            Err(BlurError::TooManyIterations {
                iterations: 17,
                max: 16
            })
        ));
        assert!(matches!(
            BlurParameters::new(base.offset(f32::NAN), 16),
            Err(BlurError::InvalidOffset(_))
        ));
        assert!(matches!(
            BlurParameters::new(base.noise(-0.1), 16),
            Err(BlurError::InvalidNoise(_))
        ));
        assert!(matches!(
            BlurParameters::new(base.noise(f32::INFINITY), 16),
            Err(BlurError::InvalidNoise(_))
        ));
        for scale in [0.0, -1.0, 1.5, f32::NAN] {
            assert!(matches!(
                BlurParameters::new(base.scale(scale), 16),
                Err(BlurError::InvalidScale(_))
            ));
        }
    }

    #[test]
    fn test_negative_offset_is_accepted() {
        // Mirrors the taps, which is still a valid kernel.
        let params = BlurParameters::new(BlurSettings::default().offset(-3.0), 16).unwrap();
        assert_eq!(params.offset(), -3.0);
    }
}
