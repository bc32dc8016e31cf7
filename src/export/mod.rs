//! Full-resolution export: render, resize, encode, write.

pub mod error;
pub mod formats;
pub mod resize;

pub use error::*;
pub use resize::{ResizePolicy, thumbnail};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::files;
use crate::watermark::{
    BoundingBox, DynWatermarkRenderer, OutputFormat, StyleDescriptor, WatermarkRenderer,
};

/// How exported files are named relative to their source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "policy", content = "value")]
pub enum NamingPolicy {
    KeepOriginal,
    Prefix(String),
    Suffix(String),
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy::Suffix("_watermark".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub naming: NamingPolicy,
    pub format: OutputFormat,
    /// JPEG quality, ignored for PNG
    pub quality: u8,
    pub resize: ResizePolicy,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            naming: NamingPolicy::default(),
            format: OutputFormat::Png,
            quality: 95,
            resize: ResizePolicy::Original,
        }
    }

    /// Options taking format and quality from `style`.
    pub fn for_style(output_dir: impl Into<PathBuf>, style: &StyleDescriptor) -> Self {
        Self {
            format: style.output_format,
            quality: style.quality,
            ..Self::new(output_dir)
        }
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_format(mut self, format: OutputFormat, quality: u8) -> Self {
        self.format = format;
        self.quality = quality;
        self
    }

    pub fn with_resize(mut self, resize: ResizePolicy) -> Self {
        self.resize = resize;
        self
    }

    fn has_output_dir(&self) -> bool {
        !self.output_dir.as_os_str().is_empty()
    }
}

/// Outcome of a batch export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    /// Paths written
    pub succeeded: Vec<PathBuf>,
    /// Sources that were skipped, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl ExportReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Watermark one image and write it per `options`. Returns the written path.
pub fn export_one(
    renderer: &dyn WatermarkRenderer,
    source: &Path,
    style: &StyleDescriptor,
    options: &ExportOptions,
) -> Result<PathBuf, ExportError> {
    if !options.has_output_dir() {
        return Err(ExportError::NoOutputDirectory);
    }
    if !files::is_supported_image(source) {
        return Err(ExportError::UnsupportedInput(source.to_path_buf()));
    }

    let destination =
        files::output_path(source, &options.output_dir, &options.naming, options.format)
            .ok_or_else(|| ExportError::UnsupportedInput(source.to_path_buf()))?;
    if options.naming == NamingPolicy::KeepOriginal
        && same_directory(parent_dir(source), &options.output_dir)
    {
        return Err(ExportError::WouldOverwriteSource(source.to_path_buf()));
    }

    std::fs::create_dir_all(&options.output_dir)?;
    write_watermarked(
        renderer,
        source,
        &destination,
        style,
        options.format,
        options.quality,
        options.resize,
    )?;

    info!("Exported {:?} -> {:?}", source, destination);
    Ok(destination)
}

/// Watermark `source` into the file `destination` at its original size.
///
/// Returns the placed box, or `None` when no text could be drawn.
pub fn apply_to_file(
    renderer: &dyn WatermarkRenderer,
    source: &Path,
    destination: &Path,
    style: &StyleDescriptor,
) -> Result<Option<BoundingBox>, ExportError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_watermarked(
        renderer,
        source,
        destination,
        style,
        style.output_format,
        style.quality,
        ResizePolicy::Original,
    )
}

/// Refuse a `destination` that names the `source` file itself.
pub fn check_destination(source: &Path, destination: &Path) -> Result<(), ExportError> {
    let same_file = match (source.canonicalize(), destination.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    let same_name = destination.file_name() == source.file_name()
        && same_directory(parent_dir(source), parent_dir(destination));

    if same_file || same_name {
        return Err(ExportError::WouldOverwriteSource(source.to_path_buf()));
    }
    Ok(())
}

fn write_watermarked(
    renderer: &dyn WatermarkRenderer,
    source: &Path,
    destination: &Path,
    style: &StyleDescriptor,
    format: OutputFormat,
    quality: u8,
    resize: ResizePolicy,
) -> Result<Option<BoundingBox>, ExportError> {
    check_destination(source, destination)?;

    let image = image::open(source)?;
    let rendered = renderer.render(&image, style);
    if rendered.bounding_box.is_none() && style.has_text() {
        warn!("Watermark could not be drawn on {:?}, writing it without one", source);
    }

    let output = resize.apply(&rendered.image)?;
    formats::save(&output, destination, format, quality)?;
    Ok(rendered.bounding_box)
}

/// Export every source on the blocking pool, one at a time.
///
/// A missing output directory fails the whole batch. Any other failure skips
/// that source and is recorded in the report.
pub async fn export_batch(
    renderer: DynWatermarkRenderer,
    sources: Vec<PathBuf>,
    style: StyleDescriptor,
    options: ExportOptions,
) -> Result<ExportReport, ExportError> {
    if !options.has_output_dir() {
        return Err(ExportError::NoOutputDirectory);
    }
    tokio::fs::create_dir_all(&options.output_dir).await?;

    let style = Arc::new(style);
    let options = Arc::new(options);
    let mut report = ExportReport::default();

    for source in sources {
        let task = {
            let renderer = Arc::clone(&renderer);
            let style = Arc::clone(&style);
            let options = Arc::clone(&options);
            let source = source.clone();
            tokio::task::spawn_blocking(move || export_one(renderer.as_ref(), &source, &style, &options))
        };

        match task.await.map_err(ExportError::from).and_then(|result| result) {
            Ok(path) => report.succeeded.push(path),
            Err(e) => {
                warn!("Skipping {:?}: {}", source, e);
                report.failed.push((source, e.to_string()));
            }
        }
    }

    info!(
        "Export finished: {} of {} succeeded",
        report.success_count(),
        report.total()
    );
    Ok(report)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
