use thiserror::Error;

/// Internal failures of one rendering attempt.
///
/// These never leave the compositor: each one moves rendering down to the next
/// simpler effect level.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Glyph layer too large: {0}x{1}")]
    LayerTooLarge(u32, u32),

    #[error("Stroke width too wide: {0}")]
    StrokeTooWide(u32),

    #[error("Shear transform failed")]
    ShearFailed,

    #[error("Rotation failed for {0} degrees")]
    RotationFailed(i32),

    #[error("Text produced no visible glyphs")]
    NoGlyphCoverage,
}
