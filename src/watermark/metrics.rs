//! Text measurement.
//!
//! Outline faces are measured from the union of their glyph pixel bounds. When
//! no glyph produces an outline the advance widths are used instead, and when
//! even those are empty a fixed `(100, 30)` box is returned. The bitmap face is
//! measured by cell count, so any script measures one cell per character.

use ab_glyph::{Font, Glyph, OutlinedGlyph, ScaleFont, point};
use imageproc::drawing::text_size;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bitmap_font::{CELL_HEIGHT, CELL_WIDTH};
use super::font::{BitmapFace, FaceKind, FontFace, OutlineFace};

/// Size used when neither extents nor advances give a usable measurement.
pub const DEFAULT_TEXT_SIZE: TextSize = TextSize {
    width: 100,
    height: 30,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextSize {
    pub width: u32,
    pub height: u32,
}

impl TextSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Which measurement produced a [`TextLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    Extents,
    Advances,
    Default,
}

/// A measured glyph run.
///
/// `origin` is the pen offset that moves the ink's top-left corner to `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub size: TextSize,
    pub origin: (f32, f32),
    pub source: MetricSource,
}

/// Pixel size of `text` drawn with `face`. Empty text measures `(0, 0)`.
pub fn measure(face: &FontFace, text: &str) -> TextSize {
    layout(face, text).size
}

pub fn layout(face: &FontFace, text: &str) -> TextLayout {
    if text.is_empty() {
        return TextLayout {
            size: TextSize::default(),
            origin: (0.0, 0.0),
            source: MetricSource::Extents,
        };
    }

    match &face.kind {
        FaceKind::Outline(outline) => layout_outline(outline, text),
        FaceKind::Bitmap(bitmap) => TextLayout {
            size: bitmap_size(*bitmap, text),
            origin: (0.0, 0.0),
            source: MetricSource::Extents,
        },
    }
}

/// Glyphs of `text` positioned on a baseline at the face's ascent, pen at x = 0.
pub(crate) fn position_glyphs(face: &OutlineFace, text: &str) -> Vec<Glyph> {
    let scaled = face.font.as_scaled(face.scale);
    let mut glyphs = Vec::with_capacity(text.chars().count());
    let mut caret = 0.0f32;
    let mut previous = None;

    for c in text.chars() {
        if c.is_control() {
            continue;
        }
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(face.scale, point(caret, scaled.ascent())));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }

    glyphs
}

pub(crate) fn outline_glyphs(face: &OutlineFace, text: &str) -> Vec<OutlinedGlyph> {
    position_glyphs(face, text)
        .into_iter()
        .filter_map(|glyph| face.font.outline_glyph(glyph))
        .collect()
}

fn layout_outline(face: &OutlineFace, text: &str) -> TextLayout {
    let outlined = outline_glyphs(face, text);

    let mut bounds: Option<(f32, f32, f32, f32)> = None;
    for glyph in &outlined {
        let rect = glyph.px_bounds();
        bounds = Some(match bounds {
            None => (rect.min.x, rect.min.y, rect.max.x, rect.max.y),
            Some((x0, y0, x1, y1)) => (
                x0.min(rect.min.x),
                y0.min(rect.min.y),
                x1.max(rect.max.x),
                y1.max(rect.max.y),
            ),
        });
    }

    if let Some((x0, y0, x1, y1)) = bounds {
        let (x0, y0) = (x0.floor(), y0.floor());
        let width = (x1.ceil() - x0).max(0.0) as u32;
        let height = (y1.ceil() - y0).max(0.0) as u32;
        if width > 0 && height > 0 {
            return TextLayout {
                size: TextSize::new(width, height),
                origin: (-x0, -y0),
                source: MetricSource::Extents,
            };
        }
    }

    // Whitespace or glyphs without outlines still advance the pen.
    let (width, _) = text_size(face.scale, face.font.as_ref(), text);
    let height = face.font.as_scaled(face.scale).height().ceil().max(0.0) as u32;
    if width > 0 && height > 0 {
        debug!("Measured {:?} by advances: {}x{}", text, width, height);
        return TextLayout {
            size: TextSize::new(width, height),
            origin: (0.0, 0.0),
            source: MetricSource::Advances,
        };
    }

    debug!("No usable metrics for {:?}, using default size", text);
    TextLayout {
        size: DEFAULT_TEXT_SIZE,
        origin: (0.0, 0.0),
        source: MetricSource::Default,
    }
}

fn bitmap_size(face: BitmapFace, text: &str) -> TextSize {
    let count = text.chars().filter(|c| !c.is_control()).count() as u32;
    if count == 0 {
        return TextSize::default();
    }
    let scale = face.pixel_scale;
    // Trailing spacing column is not part of the ink box.
    let width = count
        .saturating_mul(CELL_WIDTH)
        .saturating_mul(scale)
        .saturating_sub(scale);
    TextSize::new(width, CELL_HEIGHT.saturating_mul(scale))
}
