use image::{DynamicImage, Rgba, RgbaImage};
use photomark::watermark::{
    BoundingBox, FontResolver, StyleDescriptor, TextWatermarker, WatermarkRenderer, measure,
};
use std::sync::Arc;

fn renderer() -> TextWatermarker {
    TextWatermarker::new(Arc::new(FontResolver::builtin_only()))
}

fn black_canvas(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])))
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

#[test]
fn test_box_matches_measured_text() {
    let renderer = renderer();
    let style = test_style();
    let face = renderer.resolver().resolve(&style.font_family, false, false, 40);
    let size = measure(&face, &style.text);

    let result = renderer.render(&black_canvas(1000, 800), &style);
    let bbox = result.bounding_box.unwrap();
    assert_eq!((bbox.width, bbox.height), (size.width, size.height));
    assert_eq!(bbox, BoundingBox::new(443, 380, 115, 40));
}

#[test]
fn test_every_anchor_keeps_box_inside_canvas() {
    let renderer = renderer();
    let source = black_canvas(300, 200);

    for h in [0.0, 0.25, 0.5, 0.75, 1.0] {
        for v in [0.0, 0.5, 1.0] {
            for rotation in [0, 30, -45, 90, 180] {
                let style = StyleDescriptor {
                    rotation,
                    ..test_style().with_anchors(h, v)
                };
                let result = renderer.render(&source, &style);
                let bbox = result.bounding_box.unwrap();
                assert!(
                    bbox.right() <= 300 && bbox.bottom() <= 200,
                    "box {:?} escapes canvas at anchors ({}, {}) rotation {}",
                    bbox,
                    h,
                    v,
                    rotation
                );
                assert_eq!((result.image.width(), result.image.height()), (300, 200));
            }
        }
    }
}

#[test]
fn test_opacity_zero_leaves_pixels_untouched() {
    let renderer = renderer();
    let source = black_canvas(400, 200);
    let style = StyleDescriptor {
        opacity: 0.0,
        ..test_style()
    };

    let result = renderer.render(&source, &style);
    assert!(result.bounding_box.is_some());
    assert_eq!(result.image.to_rgba8().as_raw(), source.to_rgba8().as_raw());
}

#[test]
fn test_transparent_source_keeps_untouched_alpha() {
    let renderer = renderer();
    let source = DynamicImage::ImageRgba8(RgbaImage::new(400, 200));
    let result = renderer.render(&source, &test_style());

    let rgba = result.image.to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0)[3], 0);
    let bbox = result.bounding_box.unwrap();
    let (cx, cy) = bbox.center();
    let covered = (bbox.x..bbox.right())
        .flat_map(|x| (bbox.y..bbox.bottom()).map(move |y| (x, y)))
        .any(|(x, y)| rgba.get_pixel(x, y)[3] > 0);
    assert!(covered, "no opaque pixels near ({}, {})", cx, cy);
}

#[test]
fn test_rgb_source_renders_to_rgba() {
    let renderer = renderer();
    let source = DynamicImage::ImageRgb8(image::RgbImage::new(320, 240));
    let result = renderer.render(&source, &test_style());
    assert!(result.image.color().has_alpha());
    assert!(result.bounding_box.is_some());
}

#[test]
fn test_usable_through_trait_object() {
    let renderer: Arc<dyn WatermarkRenderer> = Arc::new(renderer());
    let result = renderer.render(&black_canvas(200, 100), &StyleDescriptor::default());
    assert!(result.bounding_box.is_some());
}
