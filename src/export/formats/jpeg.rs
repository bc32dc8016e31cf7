use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use std::io::Write;

use crate::export::ExportError;

/// Composite onto white using each pixel's alpha as the mask.
pub fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());

    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        let channel = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgb([channel(src[0]), channel(src[1]), channel(src[2])]);
    }

    out
}

/// Encode as baseline JPEG; `quality` is clamped to `1..=100`.
pub fn write<W: Write>(image: &DynamicImage, writer: W, quality: u8) -> Result<(), ExportError> {
    // JPEG has no alpha channel
    let rgb_image = if image.color().has_alpha() {
        flatten_to_rgb(image)
    } else {
        image.to_rgb8()
    };

    let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_flatten_against_white() {
        let mut rgba = RgbaImage::new(3, 1);
        rgba.put_pixel(0, 0, Rgba([255, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        rgba.put_pixel(2, 0, Rgba([10, 20, 30, 255]));

        let flat = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([127, 127, 127]));
        assert_eq!(flat.get_pixel(2, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_write_zero_quality_is_accepted() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])));
        let mut bytes = Vec::new();
        write(&image, &mut bytes, 0).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
