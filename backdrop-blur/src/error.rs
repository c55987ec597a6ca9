//! Error types.
//!
//! ## Usage
//!
//! Propagate backend failures into setup and per-frame surface allocation.

use thiserror::Error;

use crate::{chain::ChainKey, filter::FilterKind};

/// Failures reported by a [`GpuBackend`](crate::backend::GpuBackend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A texture of the requested size could not be created.
    #[error("failed to create a {width}x{height} texture: {reason}")]
    TextureCreation {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
        /// Backend specific description.
        reason: String,
    },
    /// A write or read view could not be created for an existing texture.
    #[error("failed to create a texture view: {0}")]
    ViewCreation(String),
    /// A filter program failed to parse, validate or link.
    #[error("failed to compile the {kind} program: {reason}")]
    ProgramCompilation {
        /// Which filter was being compiled.
        kind: FilterKind,
        /// Compiler diagnostics.
        reason: String,
    },
}

/// Errors returned by the public blur operations.
#[derive(Debug, Error)]
pub enum BlurError {
    /// Iteration count above the configured maximum.
    #[error("iteration count {iterations} exceeds the maximum of {max}")]
    TooManyIterations {
        /// Requested iterations.
        iterations: u32,
        /// Configured limit.
        max: u32,
    },
    /// Offset is NaN or infinite.
    #[error("sample offset must be finite, got {0}")]
    InvalidOffset(f32),
    /// Noise is negative, NaN or infinite.
    #[error("noise amplitude must be finite and non-negative, got {0}")]
    InvalidNoise(f32),
    /// Scale outside `(0, 1]`.
    #[error("resolution scale must be in (0, 1], got {0}")]
    InvalidScale(f32),
    /// A chain level could not be allocated.
    #[error("render target chain {0:?} is unavailable")]
    ChainUnavailable(ChainKey),
    /// Error from the device collaborator.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
