use image::{DynamicImage, RgbaImage};
use photomark::interaction::{PreviewGeometry, PreviewSession, to_preview_space};
use photomark::watermark::{
    DynWatermarkRenderer, FontResolver, StyleDescriptor, TextWatermarker, WatermarkRenderer,
};
use std::sync::Arc;

fn renderer() -> DynWatermarkRenderer {
    Arc::new(TextWatermarker::new(Arc::new(FontResolver::builtin_only())))
}

fn style() -> StyleDescriptor {
    StyleDescriptor {
        text: "TEST".to_string(),
        font_size: 40,
        opacity: 1.0,
        ..StyleDescriptor::default()
    }
}

#[test]
fn test_preview_box_scales_per_axis() {
    let geometry = PreviewGeometry::new((1000, 800), (500, 400));
    let rendered = renderer()
        .render(&DynamicImage::ImageRgba8(RgbaImage::new(1000, 800)), &style())
        .bounding_box
        .unwrap();

    let rect = to_preview_space(&rendered, &geometry);
    assert_eq!((rect.x, rect.y), (221.5, 190.0));
    assert_eq!((rect.width, rect.height), (57.5, 20.0));
}

#[tokio::test]
async fn test_drag_then_rerender_moves_watermark() {
    let source = DynamicImage::ImageRgba8(RgbaImage::new(800, 600));
    let mut session = PreviewSession::new(renderer(), source, (400, 300), style());

    let before = session.render_in_background().await.unwrap().bounding_box.unwrap();
    let (cx, cy) = before.center();
    let scale = 400.0 / 800.0;
    assert!(session.pointer_down((cx * scale, cy * scale)));

    // Drag to the top-left quadrant of the preview
    let update = session.pointer_move((100.0, 75.0)).unwrap();
    assert_eq!((update.horizontal_percent, update.vertical_percent), (25, 25));
    session.pointer_up();

    let after = session.render_in_background().await.unwrap().bounding_box.unwrap();
    assert!(after.x < before.x);
    assert!(after.y < before.y);
    assert!(session.is_current());

    // Missing the box does not start a drag
    assert!(!session.pointer_down((399.0, 299.0)));
    assert!(session.pointer_move((10.0, 10.0)).is_none());
}

#[test]
fn test_estimate_available_before_first_render() {
    let source = DynamicImage::ImageRgba8(RgbaImage::new(800, 600));
    let session = PreviewSession::new(renderer(), source, (400, 300), style());

    assert!(session.last_render().is_none());
    let estimate = session.hit_box();
    assert!(estimate.width > 0.0 && estimate.height > 0.0);
    assert!(session.hit_test((200.0, 150.0)));
}
