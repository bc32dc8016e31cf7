use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use photomark::export::{ExportError, ExportOptions, NamingPolicy, ResizePolicy, export_batch};
use photomark::files::collect_images;
use photomark::watermark::{
    DynWatermarkRenderer, FontResolver, OutputFormat, StyleDescriptor, TextWatermarker,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn renderer() -> DynWatermarkRenderer {
    Arc::new(TextWatermarker::new(Arc::new(FontResolver::builtin_only())))
}

fn style() -> StyleDescriptor {
    StyleDescriptor {
        text: "TEST".to_string(),
        font_size: 24,
        opacity: 1.0,
        ..StyleDescriptor::default()
    }
}

fn write_image(dir: &Path, name: &str, pixel: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    let image = RgbaImage::from_pixel(200, 120, Rgba(pixel));
    DynamicImage::ImageRgba8(image).save(&path).unwrap();
    path
}

#[tokio::test]
async fn test_batch_skips_unreadable_files() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    std::fs::create_dir_all(&input).unwrap();

    write_image(&input, "a.png", [20, 40, 60, 255]);
    write_image(&input, "c.png", [60, 40, 20, 255]);
    std::fs::write(input.join("b.png"), b"this is not a png").unwrap();

    let sources = collect_images(&[input.clone()]);
    assert_eq!(sources.len(), 3);

    let report = export_batch(renderer(), sources, style(), ExportOptions::new(&output))
        .await
        .unwrap();

    assert_eq!(report.success_count(), 2);
    assert_eq!(report.total(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, input.join("b.png"));
    assert!(output.join("a_watermark.png").is_file());
    assert!(output.join("c_watermark.png").is_file());
    assert!(!output.join("b_watermark.png").exists());
}

#[tokio::test]
async fn test_batch_without_output_dir_fails() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_image(temp_dir.path(), "a.png", [0, 0, 0, 255]);

    let err = export_batch(renderer(), vec![source], style(), ExportOptions::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::NoOutputDirectory));
}

#[tokio::test]
async fn test_png_keeps_alpha_and_jpeg_flattens_to_white() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out");
    let source = write_image(temp_dir.path(), "glass.png", [0, 0, 0, 128]);

    let png_report = export_batch(
        renderer(),
        vec![source.clone()],
        style(),
        ExportOptions::new(&output).with_naming(NamingPolicy::Prefix("wm_".into())),
    )
    .await
    .unwrap();
    let png = image::open(&png_report.succeeded[0]).unwrap();
    assert!(png.color().has_alpha());
    assert_eq!(png.get_pixel(0, 0), Rgba([0, 0, 0, 128]));

    let jpeg_report = export_batch(
        renderer(),
        vec![source],
        style(),
        ExportOptions::new(&output).with_format(OutputFormat::Jpeg, 95),
    )
    .await
    .unwrap();
    let written = &jpeg_report.succeeded[0];
    assert_eq!(written, &output.join("glass_watermark.jpg"));

    let jpeg = image::open(written).unwrap();
    assert!(!jpeg.color().has_alpha());
    // Half-transparent black over white is mid grey, give or take compression
    let corner = jpeg.to_rgb8().get_pixel(2, 2).0;
    for channel in corner {
        assert!((120..=135).contains(&channel), "corner {:?}", corner);
    }
}

#[tokio::test]
async fn test_batch_refuses_to_overwrite_sources() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_image(temp_dir.path(), "a.png", [1, 2, 3, 255]);
    let before = std::fs::read(&source).unwrap();

    let options =
        ExportOptions::new(temp_dir.path()).with_naming(NamingPolicy::KeepOriginal);
    let report = export_batch(renderer(), vec![source.clone()], style(), options)
        .await
        .unwrap();

    assert_eq!(report.success_count(), 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(std::fs::read(&source).unwrap(), before);
}

#[tokio::test]
async fn test_resize_fixed_width_keeps_aspect() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out");
    let source = write_image(temp_dir.path(), "wide.png", [90, 90, 90, 255]);

    let options = ExportOptions::new(&output).with_resize(ResizePolicy::FixedWidth(100));
    let report = export_batch(renderer(), vec![source], style(), options)
        .await
        .unwrap();

    let exported = image::open(&report.succeeded[0]).unwrap();
    assert_eq!(exported.dimensions(), (100, 60));
}
