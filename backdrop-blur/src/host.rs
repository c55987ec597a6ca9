//! GUI collaborator contract.
//!
//! ## Usage
//!
//! Connect the blur to an immediate-mode draw list.

use bitflags::bitflags;
use glam::{Vec2, Vec4};

use crate::deferred::BlurHandle;

/// Deferred command queued into the host draw list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawCallback {
    /// Run the blur for these parameters when replayed.
    Blur(BlurHandle),
    /// Ask the host renderer to rebind its own pipeline state.
    ResetRenderState,
}

bitflags! {
    /// Corners rounded by [`BackdropBlur::render`](crate::BackdropBlur::render).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CornerFlags: u8 {
        /// Top-left corner.
        const TOP_LEFT = 1 << 0;
        /// Top-right corner.
        const TOP_RIGHT = 1 << 1;
        /// Bottom-left corner.
        const BOTTOM_LEFT = 1 << 2;
        /// Bottom-right corner.
        const BOTTOM_RIGHT = 1 << 3;
        /// Both top corners.
        const TOP = Self::TOP_LEFT.bits() | Self::TOP_RIGHT.bits();
        /// Both bottom corners.
        const BOTTOM = Self::BOTTOM_LEFT.bits() | Self::BOTTOM_RIGHT.bits();
        /// Every corner.
        const ALL = Self::TOP.bits() | Self::BOTTOM.bits();
    }
}

impl Default for CornerFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Screen rectangle the blurred backdrop is painted into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackdropRect {
    /// Top-left corner in display pixels.
    pub min: Vec2,
    /// Bottom-right corner in display pixels.
    pub max: Vec2,
    /// Tint multiplied with the blurred image.
    pub tint: Vec4,
    /// Corner radius in pixels.
    pub rounding: f32,
    /// Which corners are rounded.
    pub corners: CornerFlags,
}

impl BackdropRect {
    /// Creates an untinted, square-cornered rectangle.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min,
            max,
            tint: Vec4::ONE,
            rounding: 0.0,
            corners: CornerFlags::ALL,
        }
    }

    /// Sets the tint.
    #[must_use]
    pub fn tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self
    }

    /// Sets the corner radius and the rounded corners.
    #[must_use]
    pub fn rounded(mut self, rounding: f32, corners: CornerFlags) -> Self {
        self.rounding = rounding;
        self.corners = corners;
        self
    }
}

/// Textured, rounded quad handed to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageQuad<T> {
    /// Texture to sample.
    pub texture: T,
    /// Top-left corner in display pixels.
    pub min: Vec2,
    /// Bottom-right corner in display pixels.
    pub max: Vec2,
    /// Texture coordinate at `min`.
    pub uv_min: Vec2,
    /// Texture coordinate at `max`.
    pub uv_max: Vec2,
    /// Tint.
    pub tint: Vec4,
    /// Corner radius.
    pub rounding: f32,
    /// Rounded corners.
    pub corners: CornerFlags,
}

impl<T> ImageQuad<T> {
    /// Maps `rect` onto a full-display texture: the UVs select exactly the screen area under `rect`.
    pub fn for_display(texture: T, rect: &BackdropRect, display_size: Vec2) -> Self {
        Self {
            texture,
            min: rect.min,
            max: rect.max,
            uv_min: rect.min / display_size,
            uv_max: rect.max / display_size,
            tint: rect.tint,
            rounding: rect.rounding,
            corners: rect.corners,
        }
    }
}

/// What the blur needs from the host GUI.
pub trait UiHost {
    /// Texture handle type the host draws with.
    type Texture;

    /// Queues `callback` for replay with the rest of the draw list.
    fn add_callback(&mut self, callback: DrawCallback);

    /// Returns the display size in pixels.
    fn display_size(&self) -> Vec2;

    /// Queues a textured, rounded rectangle.
    fn add_image_rounded(&mut self, image: ImageQuad<Self::Texture>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_maps_rect_onto_display() {
        let rect = BackdropRect::new(Vec2::new(100.0, 150.0), Vec2::new(300.0, 450.0));
        let quad = ImageQuad::for_display((), &rect, Vec2::new(800.0, 600.0));
        assert_eq!(quad.uv_min, Vec2::new(0.125, 0.25));
        assert_eq!(quad.uv_max, Vec2::new(0.375, 0.75));
        assert_eq!(quad.tint, Vec4::ONE);
    }

    #[test]
    fn test_corner_groups() {
        assert_eq!(CornerFlags::default(), CornerFlags::ALL);
        assert!(CornerFlags::TOP.contains(CornerFlags::TOP_RIGHT));
        assert!(!CornerFlags::BOTTOM.contains(CornerFlags::TOP_LEFT));
    }
}
