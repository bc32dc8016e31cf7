pub mod jpeg;
pub mod png;

use image::DynamicImage;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use super::ExportError;
use crate::watermark::OutputFormat;

/// Encode `image` as `format` and move it into place at `path`.
///
/// The encoded bytes go to a temporary file in the destination directory
/// first, so a failed encode never leaves a partial file at `path`.
pub fn save(
    image: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u8,
) -> Result<(), ExportError> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(directory)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        match format {
            OutputFormat::Jpeg => jpeg::write(image, &mut writer, quality)?,
            OutputFormat::Png => png::write(image, &mut writer)?,
        }
        writer.flush()?;
    }

    temp.persist(path)?;
    debug!("Saved {:?} as {:?}", path, format);
    Ok(())
}
