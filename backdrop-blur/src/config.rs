//! Runtime configuration for the blur context.
//!
//! ## Usage
//!
//! Tune cache size and pass defaults before calling [`BackdropBlur::setup`](crate::BackdropBlur::setup).

use std::{env, str::FromStr};

use tracing::warn;

/// Environment variable overriding [`BlurConfig::chain_cache_capacity`].
pub const ENV_CHAIN_CAPACITY: &str = "BACKDROP_BLUR_CHAIN_CAPACITY";
/// Environment variable overriding [`BlurConfig::max_iterations`].
pub const ENV_MAX_ITERATIONS: &str = "BACKDROP_BLUR_MAX_ITERATIONS";

/// Configuration for [`BackdropBlur`](crate::BackdropBlur).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlurConfig {
    /// Number of render target chains kept alive at once.
    ///
    /// Each distinct `(iterations, width, height)` request owns its own chain, so
    /// differently sized blur regions in one frame do not evict each other as long
    /// as they fit. A value of `1` keeps a single chain; `0` is treated as `1`.
    pub chain_cache_capacity: usize,
    /// Color every filter pass clears its destination to before drawing.
    pub clear_color: [f32; 4],
    /// Upper bound accepted for the iteration count of a single request.
    pub max_iterations: u32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            chain_cache_capacity: 4,
            clear_color: [1.0, 1.0, 1.0, 1.0],
            max_iterations: 16,
        }
    }
}

impl BlurConfig {
    /// Returns the default configuration with environment overrides applied.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = env_value(ENV_CHAIN_CAPACITY) {
            config.chain_cache_capacity = capacity;
        }
        if let Some(max) = env_value(ENV_MAX_ITERATIONS) {
            config.max_iterations = max;
        }
        config
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}
