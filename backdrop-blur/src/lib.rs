//! Frosted-glass backdrop blur for immediate-mode GUI renderers.
//!
//! The blur is a dual Kawase filter: the captured screen is repeatedly
//! downsampled into a chain of half-sized render targets and then upsampled
//! back, producing a wide, smooth blur at a fraction of the cost of a large
//! Gaussian kernel. The result lands in a persistent output texture that the
//! GUI paints behind its panels.
//!
//! # Frame flow
//!
//! 1. During frame build, [`BackdropBlur::process`] stores the request and queues
//!    a [`DrawCallback`] into the host draw list.
//! 2. During draw list replay, the host hands each callback to
//!    [`BackdropBlur::handle_callback`], which runs the filter passes.
//! 3. [`BackdropBlur::render`] paints the output texture into a rectangle.
//! 4. At the frame boundary, [`BackdropBlur::collect`] reclaims requests that
//!    can no longer be replayed.
//!
//! ```
//! use backdrop_blur::{BackdropBlur, BackdropRect, BlurSettings, UiHost, WgpuBackend};
//! use backdrop_blur::glam::Vec2;
//!
//! fn frame<H>(blur: &mut BackdropBlur<WgpuBackend>, host: &mut H)
//! where
//!     H: UiHost<Texture = backdrop_blur::wgpu::TextureView>,
//! {
//!     let settings = BlurSettings::default().iterations(3).noise(0.2);
//!     if blur.process(host, settings).is_ok() {
//!         let panel = BackdropRect::new(Vec2::new(40.0, 40.0), Vec2::new(360.0, 240.0));
//!         blur.render(host, panel);
//!     }
//! }
//! ```
//!
//! # Backends
//!
//! [`WgpuBackend`] runs the passes on a `wgpu::Device`. Other graphics APIs plug
//! in through the [`GpuBackend`] trait. With the `testing` feature,
//! [`testing::SoftBackend`] runs the same kernels on the CPU.

#![deny(missing_docs, clippy::unwrap_used)]

pub mod backend;
mod blur;
pub mod chain;
pub mod config;
pub mod deferred;
pub mod error;
pub mod filter;
pub mod host;
pub mod orchestrator;
pub mod output;
pub mod params;
pub mod pass;
pub mod surface;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wgpu_backend;

pub use glam;
pub use wgpu;

pub use crate::{
    backend::{GpuBackend, ScreenCapture, Viewport},
    blur::{BackdropBlur, BlurStats},
    config::BlurConfig,
    deferred::BlurHandle,
    error::{BackendError, BlurError},
    filter::FilterKind,
    host::{BackdropRect, CornerFlags, DrawCallback, ImageQuad, UiHost},
    orchestrator::{ExecuteOutcome, SkipReason},
    params::{BlurParameters, BlurSettings},
    wgpu_backend::WgpuBackend,
};
