pub mod bitmap_font;
pub mod color;
pub mod compositor;
pub mod error;
pub mod font;
pub mod metrics;
pub mod placement;
pub mod types;

pub use color::{Color, apply_opacity, parse_color, parse_fill_color, parse_stroke_color};
pub use compositor::{composite, composite_with};
pub use error::*;
pub use font::{FaceSource, FontFace, FontResolver, resolve_font};
pub use metrics::{TextSize, measure};
pub use placement::{clamp_origin, place, rotated_extent};
pub use types::*;

use std::sync::Arc;

/// Anything that can draw a watermark described by a [`StyleDescriptor`].
pub trait WatermarkRenderer: Send + Sync {
    /// Render onto a copy of `source`. Never fails; see [`RenderResult`].
    fn render(&self, source: &image::DynamicImage, style: &StyleDescriptor) -> RenderResult;
}

pub type DynWatermarkRenderer = Arc<dyn WatermarkRenderer>;

/// Text watermark renderer backed by a shared [`FontResolver`].
#[derive(Debug, Clone)]
pub struct TextWatermarker {
    resolver: Arc<FontResolver>,
}

impl TextWatermarker {
    pub fn new(resolver: Arc<FontResolver>) -> Self {
        Self { resolver }
    }

    pub fn from_config(config: &crate::FontConfig) -> Self {
        Self::new(Arc::new(FontResolver::from_config(config)))
    }

    pub fn resolver(&self) -> &FontResolver {
        &self.resolver
    }
}

impl Default for TextWatermarker {
    fn default() -> Self {
        Self::new(Arc::new(FontResolver::default()))
    }
}

impl WatermarkRenderer for TextWatermarker {
    fn render(&self, source: &image::DynamicImage, style: &StyleDescriptor) -> RenderResult {
        composite_with(&self.resolver, source, style)
    }
}
