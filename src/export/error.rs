use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Failed to move temporary file into place: {0}")]
    PersistError(#[from] tempfile::PersistError),

    #[error("No output directory selected")]
    NoOutputDirectory,

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(PathBuf),

    #[error("Refusing to overwrite source image: {0}")]
    WouldOverwriteSource(PathBuf),

    #[error("Resized image would be too large: {0}x{1}")]
    ResizeTooLarge(f64, f64),

    #[error("Export task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
