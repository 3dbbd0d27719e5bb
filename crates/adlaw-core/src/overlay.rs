//! Overlay projection from model-frame pixels to percentage geometry.
//!
//! The inference model works in a fixed frame (640x640 by default) while the
//! dashboard renders images at whatever size the layout gives them. Boxes are
//! therefore projected into percentages of the frame so they scale with the
//! rendered image without knowing its pixel size.
//!
//! Coordinates are clamped to the frame before conversion, so a box that
//! spills over an edge stays flush against it instead of escaping the image.

/// The reference frame a bounding box is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSize {
    pub width: f32,
    pub height: f32,
}

impl FrameSize {
    /// The model's native input frame.
    pub const MODEL: FrameSize = FrameSize {
        width: 640.0,
        height: 640.0,
    };
}

impl Default for FrameSize {
    fn default() -> Self {
        FrameSize::MODEL
    }
}

/// A bounding box in percentage geometry, ready for overlay rendering.
///
/// All fields are percentages of the frame: `left`/`top` position the box,
/// `width`/`height` size it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Project a `[x1, y1, x2, y2]` model-frame box into percentage geometry.
///
/// Coordinates are clamped to `[0, frame]` first; inverted boxes (x2 < x1 or
/// y2 < y1 after clamping) collapse to zero width or height rather than going
/// negative.
pub fn project(bbox: [f32; 4], frame: FrameSize) -> OverlayBox {
    let [x1, y1, x2, y2] = bbox;
    let x1 = x1.clamp(0.0, frame.width);
    let x2 = x2.clamp(0.0, frame.width);
    let y1 = y1.clamp(0.0, frame.height);
    let y2 = y2.clamp(0.0, frame.height);

    OverlayBox {
        left: x1 / frame.width * 100.0,
        top: y1 / frame.height * 100.0,
        width: (x2 - x1).max(0.0) / frame.width * 100.0,
        height: (y2 - y1).max(0.0) / frame.height * 100.0,
    }
}
