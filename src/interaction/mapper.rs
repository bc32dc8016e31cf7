//! Mapping between a full-resolution canvas and its scaled preview.
//!
//! Preview rectangles are in widget coordinates: the scaled image may be
//! letterboxed inside a larger widget, and `offset` is where its top-left sits.

use serde::Serialize;

use crate::watermark::{BoundingBox, StyleDescriptor};

/// Estimated glyph width as a fraction of the font size.
pub const ESTIMATE_CHAR_WIDTH: f32 = 0.6;
/// Estimated line height as a fraction of the font size.
pub const ESTIMATE_LINE_HEIGHT: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewGeometry {
    /// Full-resolution canvas size
    pub canvas: (u32, u32),
    /// Displayed size of the scaled image
    pub preview: (u32, u32),
    /// Top-left of the displayed image inside the widget
    pub offset: (f32, f32),
}

impl PreviewGeometry {
    /// A preview filling its widget exactly, with no letterbox offset.
    pub fn new(canvas: (u32, u32), preview: (u32, u32)) -> Self {
        Self {
            canvas,
            preview,
            offset: (0.0, 0.0),
        }
    }

    /// Aspect-preserving fit of `canvas` into a `widget`, centred.
    pub fn fit(canvas: (u32, u32), widget: (u32, u32)) -> Self {
        if canvas.0 == 0 || canvas.1 == 0 {
            return Self::new(canvas, (0, 0));
        }

        let scale = (widget.0 as f32 / canvas.0 as f32).min(widget.1 as f32 / canvas.1 as f32);
        let preview = (
            ((canvas.0 as f32 * scale).round() as u32).clamp(1, widget.0.max(1)),
            ((canvas.1 as f32 * scale).round() as u32).clamp(1, widget.1.max(1)),
        );
        let offset = (
            (widget.0.saturating_sub(preview.0) / 2) as f32,
            (widget.1.saturating_sub(preview.1) / 2) as f32,
        );

        Self {
            canvas,
            preview,
            offset,
        }
    }

    /// Independent horizontal and vertical preview/canvas ratios.
    pub fn scale(&self) -> (f32, f32) {
        let ratio = |preview: u32, canvas: u32| {
            if canvas == 0 {
                0.0
            } else {
                preview as f32 / canvas as f32
            }
        };
        (
            ratio(self.preview.0, self.canvas.0),
            ratio(self.preview.1, self.canvas.1),
        )
    }

    /// Widget point relative to the displayed image's top-left.
    pub fn to_image_point(&self, point: (f32, f32)) -> (f32, f32) {
        (point.0 - self.offset.0, point.1 - self.offset.1)
    }
}

/// A rectangle in preview (widget) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PreviewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PreviewRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn translated(&self, (dx, dy): (f32, f32)) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// New anchors produced by dragging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragUpdate {
    pub horizontal_anchor: f32,
    pub vertical_anchor: f32,
    /// Anchors as whole percentages, for display
    pub horizontal_percent: u32,
    pub vertical_percent: u32,
}

impl DragUpdate {
    pub fn from_anchors(horizontal: f32, vertical: f32) -> Self {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let (horizontal, vertical) = (unit(horizontal), unit(vertical));
        Self {
            horizontal_anchor: horizontal,
            vertical_anchor: vertical,
            horizontal_percent: (horizontal * 100.0).round() as u32,
            vertical_percent: (vertical * 100.0).round() as u32,
        }
    }

    pub fn centered() -> Self {
        Self::from_anchors(0.5, 0.5)
    }
}

/// Scale a canvas box into preview space, including the letterbox offset.
pub fn to_preview_space(canvas_box: &BoundingBox, geometry: &PreviewGeometry) -> PreviewRect {
    let (sx, sy) = geometry.scale();
    PreviewRect::new(
        canvas_box.x as f32 * sx + geometry.offset.0,
        canvas_box.y as f32 * sy + geometry.offset.1,
        canvas_box.width as f32 * sx,
        canvas_box.height as f32 * sy,
    )
}

/// Map a widget point back to canvas pixels.
pub fn to_canvas_space(point: (f32, f32), geometry: &PreviewGeometry) -> (f32, f32) {
    let (sx, sy) = geometry.scale();
    let (x, y) = geometry.to_image_point(point);
    let unscale = |v: f32, s: f32| if s == 0.0 { 0.0 } else { v / s };
    (unscale(x, sx), unscale(y, sy))
}

/// Rectangle containment, edges included.
pub fn is_inside(point: (f32, f32), rect: &PreviewRect) -> bool {
    point.0 >= rect.x
        && point.0 <= rect.x + rect.width
        && point.1 >= rect.y
        && point.1 <= rect.y + rect.height
}

/// Heuristic hit box for `style` when no rendered box is available.
///
/// The result is in preview-image coordinates and always lies inside
/// `preview_size`.
pub fn estimate_box(style: &StyleDescriptor, preview_size: (u32, u32)) -> PreviewRect {
    let (pw, ph) = (preview_size.0 as f32, preview_size.1 as f32);
    let style = style.normalized();
    let size = style.font_size as f32;
    let chars = style.text.chars().count() as f32;

    let width = (ESTIMATE_CHAR_WIDTH * size * chars).min(pw / 2.0);
    let height = (ESTIMATE_LINE_HEIGHT * size).min(ph / 2.0);

    let (width, height) = if style.rotation == 0 {
        (width, height)
    } else {
        let theta = (style.rotation as f32).to_radians();
        let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
        (width * cos + height * sin, width * sin + height * cos)
    };
    let (width, height) = (width.min(pw), height.min(ph));

    PreviewRect::new(
        (pw - width) * style.horizontal_anchor,
        (ph - height) * style.vertical_anchor,
        width,
        height,
    )
}

/// Anchors for a pointer at `point` over an image of `preview_size`.
pub fn drag_update(point: (f32, f32), preview_size: (u32, u32)) -> DragUpdate {
    let ratio = |v: f32, size: u32| if size == 0 { 0.5 } else { v / size as f32 };
    DragUpdate::from_anchors(ratio(point.0, preview_size.0), ratio(point.1, preview_size.1))
}
