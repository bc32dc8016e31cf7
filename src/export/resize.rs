use image::{DynamicImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use super::ExportError;

/// How an exported image is resized after compositing. Aspect ratio is always kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "mode", content = "value")]
pub enum ResizePolicy {
    #[default]
    Original,
    FixedWidth(u32),
    FixedHeight(u32),
    /// Scale in percent, 100.0 keeps the original size
    Percentage(f32),
}

/// Largest output side accepted; JPEG cannot encode beyond it.
pub const MAX_OUTPUT_SIDE: u32 = 65_535;
/// Largest output area accepted, 256 megapixels.
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 28;

impl ResizePolicy {
    /// Output size for an image of `size`. Never returns a zero dimension.
    ///
    /// Sizes beyond [`MAX_OUTPUT_SIDE`] or [`MAX_OUTPUT_PIXELS`] are refused.
    pub fn target_size(&self, (width, height): (u32, u32)) -> Result<(u32, u32), ExportError> {
        if width == 0 || height == 0 {
            return Ok((width, height));
        }
        let scaled = |v: u32, factor: f64| (v as f64 * factor).round().max(1.0);

        let (target_w, target_h) = match *self {
            ResizePolicy::Original => return Ok((width, height)),
            ResizePolicy::FixedWidth(target) if target > 0 => {
                (target as f64, scaled(height, target as f64 / width as f64))
            }
            ResizePolicy::FixedHeight(target) if target > 0 => {
                (scaled(width, target as f64 / height as f64), target as f64)
            }
            ResizePolicy::Percentage(percent) if percent.is_finite() && percent > 0.0 => {
                let factor = percent as f64 / 100.0;
                (scaled(width, factor), scaled(height, factor))
            }
            _ => return Ok((width, height)),
        };

        let too_large = target_w > MAX_OUTPUT_SIDE as f64
            || target_h > MAX_OUTPUT_SIDE as f64
            || target_w * target_h > MAX_OUTPUT_PIXELS as f64;
        if too_large {
            return Err(ExportError::ResizeTooLarge(target_w, target_h));
        }
        Ok((target_w as u32, target_h as u32))
    }

    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, ExportError> {
        let original = (image.width(), image.height());
        let (width, height) = self.target_size(original)?;
        if (width, height) == original {
            return Ok(image.clone());
        }
        debug!("Resizing {:?} -> {:?} ({:?})", original, (width, height), self);
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }
}

impl FromStr for ResizePolicy {
    type Err = String;

    /// Parses `original`, `width:800`, `height:600` or `50%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("original") {
            return Ok(ResizePolicy::Original);
        }
        if let Some(percent) = s.strip_suffix('%') {
            return percent
                .trim()
                .parse::<f32>()
                .map(ResizePolicy::Percentage)
                .map_err(|e| format!("invalid percentage {:?}: {}", s, e));
        }

        let (mode, value) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid resize policy: {}", s))?;
        let value: u32 = value
            .trim()
            .parse()
            .map_err(|e| format!("invalid resize value {:?}: {}", value, e))?;

        match mode.trim().to_lowercase().as_str() {
            "width" | "w" => Ok(ResizePolicy::FixedWidth(value)),
            "height" | "h" => Ok(ResizePolicy::FixedHeight(value)),
            other => Err(format!("unknown resize mode: {}", other)),
        }
    }
}

/// Aspect-preserving downscale to fit within `max_width` x `max_height`; never upscales.
pub fn thumbnail(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image.clone();
    }
    image.resize(max_width.max(1), max_height.max(1), FilterType::Lanczos3)
}
