//! Renders a text watermark onto a copy of a source image.
//!
//! The glyph run is rasterised into a coverage mask on a padded, transparent
//! layer. Synthetic bold and italic reshape that mask, shadow and stroke are
//! derived from it, and the painted layer is optionally rotated before being
//! alpha-composited onto the canvas.
//!
//! Any failure inside one attempt drops the most expensive remaining effect
//! and tries again (stroke, then shadow, then rotation, then everything). Only
//! when no text can be drawn at all is the source returned unchanged.

use image::{DynamicImage, GrayImage, Luma, Pixel, Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, rotate_about_center, warp};
use tracing::{debug, warn};

use super::bitmap_font::{self, CELL_HEIGHT, CELL_WIDTH, GLYPH_WIDTH};
use super::color::{Color, apply_opacity, parse_fill_color, parse_stroke_color};
use super::error::RenderError;
use super::font::{FaceKind, FontFace, FontResolver, resolve_font};
use super::metrics::{self, TextLayout, TextSize};
use super::placement::{clamp_origin, place, rotated_extent};
use super::types::{BoundingBox, RenderResult, StyleDescriptor};

/// Minimum transparent margin around the glyph run on the effect layer.
pub const LAYER_PADDING: u32 = 20;
/// Horizontal shear applied for synthetic italic.
pub const ITALIC_SHEAR: f32 = 0.2;
/// Drop shadow offset in pixels, right and down.
pub const SHADOW_OFFSET: (i64, i64) = (2, 2);

const MAX_LAYER_SIDE: u32 = 16_384;
const MAX_STROKE_WIDTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EffectLevel {
    Full,
    NoStroke,
    NoShadow,
    NoRotation,
    Plain,
}

impl EffectLevel {
    fn next(self) -> Option<Self> {
        match self {
            EffectLevel::Full => Some(EffectLevel::NoStroke),
            EffectLevel::NoStroke => Some(EffectLevel::NoShadow),
            EffectLevel::NoShadow => Some(EffectLevel::NoRotation),
            EffectLevel::NoRotation => Some(EffectLevel::Plain),
            EffectLevel::Plain => None,
        }
    }

    fn stroke(self) -> bool {
        self == EffectLevel::Full
    }

    fn shadow(self) -> bool {
        matches!(self, EffectLevel::Full | EffectLevel::NoStroke)
    }

    fn rotation(self) -> bool {
        matches!(
            self,
            EffectLevel::Full | EffectLevel::NoStroke | EffectLevel::NoShadow
        )
    }

    fn synthetic_style(self) -> bool {
        self != EffectLevel::Plain
    }
}

/// Render `descriptor` onto a copy of `source` using the process-wide font resolver.
pub fn composite(source: &DynamicImage, descriptor: &StyleDescriptor) -> RenderResult {
    let style = descriptor.normalized();
    let face = resolve_font(&style.font_family, style.bold, style.italic, style.font_size);
    composite_with_face(source, &style, face)
}

/// Render `descriptor` onto a copy of `source`, resolving fonts through `resolver`.
pub fn composite_with(
    resolver: &FontResolver,
    source: &DynamicImage,
    descriptor: &StyleDescriptor,
) -> RenderResult {
    let style = descriptor.normalized();
    let face = resolver.resolve(&style.font_family, style.bold, style.italic, style.font_size);
    composite_with_face(source, &style, face)
}

fn composite_with_face(source: &DynamicImage, style: &StyleDescriptor, face: FontFace) -> RenderResult {
    if !style.has_text() || source.width() == 0 || source.height() == 0 {
        return RenderResult::unchanged(source);
    }

    match render_with_face(source, style, &face) {
        Ok(result) => result,
        Err(e) if !face.is_builtin() => {
            warn!("Outline face could not draw {:?} ({}), using built-in face", style.text, e);
            let builtin = FontFace::builtin(style.font_size);
            render_with_face(source, style, &builtin).unwrap_or_else(|e| {
                warn!("Watermark could not be drawn: {}", e);
                RenderResult::unchanged(source)
            })
        }
        Err(e) => {
            warn!("Watermark could not be drawn: {}", e);
            RenderResult::unchanged(source)
        }
    }
}

fn render_with_face(
    source: &DynamicImage,
    style: &StyleDescriptor,
    face: &FontFace,
) -> Result<RenderResult, RenderError> {
    let layout = metrics::layout(face, &style.text);
    if layout.size.is_empty() {
        return Err(RenderError::NoGlyphCoverage);
    }

    let mut level = EffectLevel::Full;
    loop {
        match render_at_level(source, style, face, &layout, level) {
            Ok(result) => return Ok(result),
            Err(RenderError::NoGlyphCoverage) => return Err(RenderError::NoGlyphCoverage),
            Err(e) => match level.next() {
                Some(next) => {
                    warn!("Watermark effect failed ({}), retrying with {:?}", e, next);
                    level = next;
                }
                None => return Err(e),
            },
        }
    }
}

fn render_at_level(
    source: &DynamicImage,
    style: &StyleDescriptor,
    face: &FontFace,
    layout: &TextLayout,
    level: EffectLevel,
) -> Result<RenderResult, RenderError> {
    let canvas_size = (source.width(), source.height());
    let bold = style.bold && level.synthetic_style();
    let italic = style.italic && level.synthetic_style();
    let shadow = style.shadow && level.shadow();
    let stroke_width = (style.stroke && level.stroke()).then_some(style.stroke_width);
    let rotation = if level.rotation() { style.rotation } else { 0 };

    if let Some(width) = stroke_width {
        if width > MAX_STROKE_WIDTH {
            return Err(RenderError::StrokeTooWide(width));
        }
    }

    let text = layout.size;
    let italic_extra = if italic {
        (text.height as f32 * ITALIC_SHEAR).ceil() as u32
    } else {
        0
    };
    let text_box = TextSize::new(text.width.saturating_add(italic_extra), text.height);
    let (x, y) = place(
        canvas_size,
        text_box,
        style.horizontal_anchor,
        style.vertical_anchor,
    );

    let bleed = stroke_width.unwrap_or(0) + if shadow { SHADOW_OFFSET.0 as u32 } else { 0 } + 4;
    let pad = LAYER_PADDING.max(bleed);
    let layer_size = (
        text_box.width.saturating_add(2 * pad),
        text_box.height.saturating_add(2 * pad),
    );
    if layer_size.0 > MAX_LAYER_SIDE || layer_size.1 > MAX_LAYER_SIDE {
        return Err(RenderError::LayerTooLarge(layer_size.0, layer_size.1));
    }

    let mut fill = rasterize(face, &style.text, layout, layer_size, pad)?;
    if bold {
        fill = embolden(&fill);
    }
    if italic {
        fill = shear(&fill, (pad + text.height) as f32)?;
    }

    let fill_color = apply_opacity(parse_fill_color(&style.color), style.opacity);
    let mut layer = RgbaImage::new(layer_size.0, layer_size.1);

    // Painted bottom to top: shadow, stroke, fill.
    if shadow {
        let offset = shift(&fill, SHADOW_OFFSET);
        paint(&mut layer, &offset, apply_opacity(Color::BLACK, style.opacity / 2.0));
    }
    if let Some(width) = stroke_width {
        let outline = dilate(&fill, width);
        let stroke_color = parse_stroke_color(&style.stroke_color).with_alpha(fill_color[3]);
        paint(&mut layer, &outline, stroke_color);
    }
    paint(&mut layer, &fill, fill_color);

    let center = (
        x as f32 + text_box.width as f32 / 2.0,
        y as f32 + text_box.height as f32 / 2.0,
    );

    let (layer, bounding_box, center) = if rotation == 0 {
        let bounding_box = BoundingBox::new(x, y, text_box.width, text_box.height);
        (layer, bounding_box, center)
    } else {
        let rotated = rotate_layer(&layer, rotation)?;
        let extent = rotated_extent(text_box.width, text_box.height, rotation as f32);
        let origin = clamp_origin(center, extent, canvas_size);
        let bounding_box = BoundingBox::new(origin.0, origin.1, extent.0, extent.1);
        (rotated, bounding_box, bounding_box.center())
    };

    let layer_x = (center.0 - layer.width() as f32 / 2.0).round() as i64;
    let layer_y = (center.1 - layer.height() as f32 / 2.0).round() as i64;

    let mut canvas = source.to_rgba8();
    imageops::overlay(&mut canvas, &layer, layer_x, layer_y);

    debug!(
        "Rendered watermark {:?} at {:?} ({:?}, face {:?})",
        style.text, bounding_box, level, face.source
    );

    Ok(RenderResult {
        image: DynamicImage::ImageRgba8(canvas),
        bounding_box: Some(bounding_box),
    })
}

/// Coverage mask of the glyph run with the ink's top-left at `(pad, pad)`.
fn rasterize(
    face: &FontFace,
    text: &str,
    layout: &TextLayout,
    size: (u32, u32),
    pad: u32,
) -> Result<GrayImage, RenderError> {
    let mut mask = GrayImage::new(size.0, size.1);

    match &face.kind {
        FaceKind::Outline(outline) => {
            let offset_x = pad as f32 + layout.origin.0;
            let offset_y = pad as f32 + layout.origin.1;

            for glyph in metrics::outline_glyphs(outline, text) {
                let bounds = glyph.px_bounds();
                let gx = (bounds.min.x + offset_x).round() as i64;
                let gy = (bounds.min.y + offset_y).round() as i64;

                glyph.draw(|px, py, coverage| {
                    let x = gx + px as i64;
                    let y = gy + py as i64;
                    if x < 0 || y < 0 || x >= size.0 as i64 || y >= size.1 as i64 {
                        return;
                    }
                    let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                    let pixel = mask.get_pixel_mut(x as u32, y as u32);
                    pixel[0] = pixel[0].max(value);
                });
            }
        }
        FaceKind::Bitmap(bitmap) => {
            let scale = bitmap.pixel_scale;
            let glyphs = text.chars().filter(|c| !c.is_control());

            for (index, c) in glyphs.enumerate() {
                let columns = bitmap_font::glyph(c);
                let cell_x = pad + index as u32 * CELL_WIDTH * scale;

                for col in 0..GLYPH_WIDTH {
                    for row in 0..CELL_HEIGHT {
                        if !bitmap_font::is_set(&columns, col, row) {
                            continue;
                        }
                        fill_block(&mut mask, cell_x + col * scale, pad + row * scale, scale);
                    }
                }
            }
        }
    }

    if mask.pixels().all(|p| p[0] == 0) {
        return Err(RenderError::NoGlyphCoverage);
    }
    Ok(mask)
}

fn fill_block(mask: &mut GrayImage, x: u32, y: u32, side: u32) {
    for dy in 0..side {
        for dx in 0..side {
            if x + dx < mask.width() && y + dy < mask.height() {
                mask.put_pixel(x + dx, y + dy, Luma([255]));
            }
        }
    }
}

/// Copy of `mask` moved by `(dx, dy)`; uncovered pixels are empty.
fn shift(mask: &GrayImage, (dx, dy): (i64, i64)) -> GrayImage {
    let mut out = GrayImage::new(mask.width(), mask.height());
    imageops::replace(&mut out, mask, dx, dy);
    out
}

fn max_merge(into: &mut GrayImage, other: &GrayImage) {
    for (dst, src) in into.pixels_mut().zip(other.pixels()) {
        dst[0] = dst[0].max(src[0]);
    }
}

/// Synthetic bold: union of the mask with its one-pixel cardinal shifts.
fn embolden(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for offset in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
        max_merge(&mut out, &shift(mask, offset));
    }
    out
}

/// Synthetic italic: lean the mask right, pivoting on the `baseline` row.
fn shear(mask: &GrayImage, baseline: f32) -> Result<GrayImage, RenderError> {
    let k = ITALIC_SHEAR;
    let projection = Projection::from_matrix([1.0, -k, k * baseline, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
        .ok_or(RenderError::ShearFailed)?;
    Ok(warp(mask, &projection, Interpolation::Bilinear, Luma([0])))
}

/// Stroke coverage: the mask dilated over a disc of `radius` pixels.
fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    let r = radius as i64;
    let disc: Vec<(i64, i64)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
        .collect();

    let (width, height) = (mask.width() as i64, mask.height() as i64);
    let mut out = GrayImage::new(mask.width(), mask.height());

    for (x, y, pixel) in mask.enumerate_pixels() {
        let value = pixel[0];
        if value == 0 {
            continue;
        }
        for (dx, dy) in &disc {
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            let target = out.get_pixel_mut(nx as u32, ny as u32);
            target[0] = target[0].max(value);
        }
    }

    out
}

/// Blend `color` into `layer` wherever `mask` has coverage.
fn paint(layer: &mut RgbaImage, mask: &GrayImage, color: Rgba<u8>) {
    for (dst, coverage) in layer.pixels_mut().zip(mask.pixels()) {
        let coverage = coverage[0];
        if coverage == 0 {
            continue;
        }
        let alpha = (color[3] as u32 * coverage as u32 + 127) / 255;
        dst.blend(&Rgba([color[0], color[1], color[2], alpha as u8]));
    }
}

/// Rotate counter-clockwise by `degrees` on a canvas large enough for any angle.
fn rotate_layer(layer: &RgbaImage, degrees: i32) -> Result<RgbaImage, RenderError> {
    let (width, height) = layer.dimensions();
    let (rotated_w, rotated_h) = rotated_extent(width, height, degrees as f32);

    // Same parity as the layer keeps it exactly centred on the expanded canvas.
    let expand = |rotated: u32, original: u32| {
        let side = rotated.max(original);
        side + (side - original) % 2
    };
    let expanded = (expand(rotated_w, width), expand(rotated_h, height));
    if expanded.0 > MAX_LAYER_SIDE || expanded.1 > MAX_LAYER_SIDE {
        return Err(RenderError::RotationFailed(degrees));
    }

    let mut canvas = RgbaImage::new(expanded.0, expanded.1);
    imageops::replace(
        &mut canvas,
        layer,
        ((expanded.0 - width) / 2) as i64,
        ((expanded.1 - height) / 2) as i64,
    );

    // imageproc rotates clockwise for positive angles.
    let theta = -(degrees as f32).to_radians();
    Ok(rotate_about_center(
        &canvas,
        theta,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::types::WatermarkStyle;

    fn canvas(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    fn test_style() -> StyleDescriptor {
        StyleDescriptor {
            text: "TEST".to_string(),
            font_size: 40,
            opacity: 1.0,
            color: "#FFFFFF".to_string(),
            ..StyleDescriptor::default()
        }
    }

    fn render(source: &DynamicImage, style: &StyleDescriptor) -> RenderResult {
        composite_with(&FontResolver::builtin_only(), source, style)
    }

    #[test]
    fn test_empty_text_is_identity() {
        let source = canvas(64, 48, [10, 20, 30, 255]);
        for text in ["", "   ", "\t\n"] {
            let style = StyleDescriptor {
                text: text.to_string(),
                ..test_style()
            };
            let result = render(&source, &style);
            assert!(result.bounding_box.is_none());
            assert_eq!(result.image.as_bytes(), source.as_bytes());
        }
    }

    #[test]
    fn test_centered_text_scenario() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let result = render(&source, &test_style());

        let bbox = result.bounding_box.unwrap();
        assert_eq!(bbox, BoundingBox::new(443, 380, 115, 40));
        let (cx, cy) = bbox.center();
        assert!((cx - 500.0).abs() <= 1.0);
        assert!((cy - 400.0).abs() <= 1.0);

        // Middle of the T stem
        let rgba = result.image.to_rgba8();
        assert_eq!(rgba.get_pixel(455, 397), &Rgba([255, 255, 255, 255]));
        // Gap between the T's bar ends and its stem stays untouched
        assert_eq!(rgba.get_pixel(444, 410), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_top_left_anchor() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let style = test_style().with_anchors(0.0, 0.0);
        let result = render(&source, &style);

        let bbox = result.bounding_box.unwrap();
        assert_eq!((bbox.x, bbox.y), (0, 0));
        let rgba = result.image.to_rgba8();
        assert_eq!(rgba.get_pixel(12, 17), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_source_is_not_mutated() {
        let source = canvas(200, 100, [40, 40, 40, 255]);
        let before = source.clone();
        let result = render(&source, &test_style());
        assert_eq!(source.as_bytes(), before.as_bytes());
        assert_ne!(result.image.as_bytes(), source.as_bytes());
    }

    #[test]
    fn test_quarter_rotation_swaps_box() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let flat = render(&source, &test_style()).bounding_box.unwrap();
        let style = StyleDescriptor {
            rotation: 90,
            ..test_style()
        };
        let result = render(&source, &style);
        let rotated = result.bounding_box.unwrap();

        assert_eq!((rotated.width, rotated.height), (flat.height, flat.width));
        let (fx, fy) = flat.center();
        let (rx, ry) = rotated.center();
        assert!((fx - rx).abs() <= 1.0 && (fy - ry).abs() <= 1.0);

        let rgba = result.image.to_rgba8();
        let lit = (rotated.y..rotated.bottom())
            .flat_map(|y| (rotated.x..rotated.right()).map(move |x| (x, y)))
            .filter(|&(x, y)| rgba.get_pixel(x, y)[0] > 128)
            .count();
        assert!(lit > 100);
    }

    #[test]
    fn test_rotated_box_is_clamped_into_canvas() {
        let source = canvas(400, 300, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            rotation: 45,
            ..test_style().with_anchors(0.0, 0.0)
        };
        let bbox = render(&source, &style).bounding_box.unwrap();
        // The unclamped origin would sit 35px above the canvas.
        assert_eq!(bbox.y, 0);
        assert_eq!((bbox.width, bbox.height), (110, 110));
        assert!(bbox.right() <= 400 && bbox.bottom() <= 300);
    }

    #[test]
    fn test_italic_widens_box() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            italic: true,
            ..test_style()
        };
        let bbox = render(&source, &style).bounding_box.unwrap();
        assert_eq!(bbox.width, 115 + 8);
        assert_eq!(bbox.height, 40);
    }

    #[test]
    fn test_stroke_draws_outline_color() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            stroke: true,
            stroke_width: 2,
            stroke_color: "#FF0000".to_string(),
            ..test_style()
        };
        let rgba = render(&source, &style).image.to_rgba8();
        // Two pixels left of the T's bar
        assert_eq!(rgba.get_pixel(441, 382), &Rgba([255, 0, 0, 255]));
        assert_eq!(rgba.get_pixel(455, 397), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_shadow_darkens_below_glyph() {
        let source = canvas(1000, 800, [255, 255, 255, 255]);
        let plain = StyleDescriptor {
            color: "#FF0000".to_string(),
            ..test_style()
        };
        let shadowed = StyleDescriptor {
            shadow: true,
            ..plain.clone()
        };

        // Just below the bottom of the T stem
        let without = render(&source, &plain).image.to_rgba8();
        let with = render(&source, &shadowed).image.to_rgba8();
        assert_eq!(without.get_pixel(455, 416)[0], 255);
        assert!(with.get_pixel(455, 416)[0] < 200);
    }

    #[test]
    fn test_half_opacity_blends() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            opacity: 0.5,
            ..test_style()
        };
        let rgba = render(&source, &style).image.to_rgba8();
        let value = rgba.get_pixel(455, 397)[0];
        assert!((127..=129).contains(&value), "got {}", value);
    }

    #[test]
    fn test_malformed_color_renders_white() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            color: "zzzzzz".to_string(),
            ..test_style()
        };
        let rgba = render(&source, &style).image.to_rgba8();
        assert_eq!(rgba.get_pixel(455, 397), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_text_larger_than_canvas_is_placed_at_origin() {
        let source = canvas(60, 20, [0, 0, 0, 255]);
        let result = render(&source, &test_style());
        let bbox = result.bounding_box.unwrap();
        assert_eq!((bbox.x, bbox.y), (0, 0));
        assert_eq!((result.image.width(), result.image.height()), (60, 20));
    }

    #[test]
    fn test_style_variants_render_like_single() {
        let source = canvas(300, 200, [0, 0, 0, 255]);
        let single = render(&source, &test_style());
        for variant in [WatermarkStyle::Tile, WatermarkStyle::Diagonal] {
            let style = StyleDescriptor {
                style: variant,
                ..test_style()
            };
            let result = render(&source, &style);
            assert_eq!(result.bounding_box, single.bounding_box);
            assert_eq!(result.image.as_bytes(), single.image.as_bytes());
        }
    }

    #[test]
    fn test_oversized_stroke_degrades_instead_of_failing() {
        let source = canvas(1000, 800, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            stroke: true,
            stroke_width: 500,
            ..test_style()
        };
        let result = render(&source, &style);
        assert_eq!(result.bounding_box, Some(BoundingBox::new(443, 380, 115, 40)));
    }

    #[test]
    fn test_huge_font_size_leaves_source_unchanged() {
        let source = canvas(100, 100, [10, 20, 30, 255]);
        for font_size in [u32::MAX, 1_000_000_000, 20_000] {
            let style = StyleDescriptor {
                font_size,
                ..test_style()
            };
            let result = render(&source, &style);
            assert!(result.bounding_box.is_none(), "font size {}", font_size);
            assert_eq!(result.image.as_bytes(), source.as_bytes());
        }
    }

    #[test]
    fn test_cjk_text_renders_with_builtin_face() {
        let source = canvas(400, 200, [0, 0, 0, 255]);
        let style = StyleDescriptor {
            text: "我的图片".to_string(),
            ..test_style()
        };
        let bbox = render(&source, &style).bounding_box.unwrap();
        assert_eq!((bbox.width, bbox.height), (115, 40));
    }

    #[test]
    fn test_dilate_covers_disc() {
        let mut mask = GrayImage::new(9, 9);
        mask.put_pixel(4, 4, Luma([255]));
        let out = dilate(&mask, 2);
        assert_eq!(out.get_pixel(6, 4)[0], 255);
        assert_eq!(out.get_pixel(5, 5)[0], 255);
        assert_eq!(out.get_pixel(6, 6)[0], 0);
    }
}
