use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

/// How the watermark is repeated across the canvas.
///
/// Only `Single` has its own rendering path; `Tile` and `Diagonal` are kept so
/// that stored templates round-trip, and render exactly like `Single`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkStyle {
    #[default]
    Single,
    Tile,
    Diagonal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("unsupported output format: {}", other)),
        }
    }
}

/// Full parameter set for one watermark.
///
/// Serialized as a flat key/value mapping; opacity and anchors are stored as
/// fractions in `[0, 1]`, never as percentages.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StyleDescriptor {
    pub text: String,
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
    pub font_size: u32,
    pub color: String,
    pub opacity: f32,
    pub rotation: i32,
    pub horizontal_anchor: f32,
    pub vertical_anchor: f32,
    pub shadow: bool,
    pub stroke: bool,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub style: WatermarkStyle,
    pub output_format: OutputFormat,
    pub quality: u8,
}

impl Default for StyleDescriptor {
    fn default() -> Self {
        Self {
            text: "我的图片".to_string(),
            font_family: "Microsoft YaHei".to_string(),
            bold: false,
            italic: false,
            font_size: 30,
            color: "#FFFFFF".to_string(),
            opacity: 0.5,
            rotation: 0,
            horizontal_anchor: 0.5,
            vertical_anchor: 0.5,
            shadow: false,
            stroke: false,
            stroke_width: 2,
            stroke_color: "#000000".to_string(),
            style: WatermarkStyle::Single,
            output_format: OutputFormat::Png,
            quality: 90,
        }
    }
}

impl StyleDescriptor {
    /// Copy with every numeric field pulled into its documented range.
    pub fn normalized(&self) -> Self {
        let clamp_unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };

        Self {
            font_size: self.font_size.max(1),
            opacity: clamp_unit(self.opacity),
            rotation: self.rotation.clamp(-180, 180),
            horizontal_anchor: clamp_unit(self.horizontal_anchor),
            vertical_anchor: clamp_unit(self.vertical_anchor),
            stroke_width: self.stroke_width.max(1),
            quality: self.quality.min(100),
            ..self.clone()
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn with_anchors(&self, horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal_anchor: horizontal,
            vertical_anchor: vertical,
            ..self.clone()
        }
    }
}

pub(crate) fn opacity_to_alpha(opacity: f32) -> u8 {
    if !opacity.is_finite() {
        return 0;
    }
    (opacity * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Pixel rectangle in the coordinate space of the canvas it was produced for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }
}

/// Output of one compositor call.
///
/// `bounding_box` is `None` only when no text could be drawn at all, in which
/// case `image` is an untouched copy of the input.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub image: DynamicImage,
    pub bounding_box: Option<BoundingBox>,
}

impl RenderResult {
    pub fn unchanged(source: &DynamicImage) -> Self {
        Self {
            image: source.clone(),
            bounding_box: None,
        }
    }
}
