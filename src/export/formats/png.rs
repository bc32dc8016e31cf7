use image::{DynamicImage, codecs::png::PngEncoder};
use std::io::Write;

use crate::export::ExportError;

/// Encode as PNG, keeping the alpha channel.
pub fn write<W: Write>(image: &DynamicImage, writer: W) -> Result<(), ExportError> {
    let encoder = PngEncoder::new(writer);
    image.write_with_encoder(encoder)?;
    Ok(())
}
