use crate::Config;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create storage directory: {0}")]
    StorageDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Storage path is not a directory: {0}")]
    StorageNotADirectory(String),

    #[error("Font directory does not exist: {0}")]
    FontDirectoryMissing(String),

    #[error("Invalid export setting: {0}")]
    InvalidExportSetting(String),
}

impl StartupCheckError {
    /// Whether the application cannot work without this being fixed.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::StorageDirectoryCreationFailed(_)
                | StartupCheckError::StorageNotADirectory(_)
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    // Storage holds templates and last settings
    let storage_dir = Path::new(&config.storage.directory);
    if !storage_dir.exists() {
        info!("Storage directory does not exist, creating: {:?}", storage_dir);
        if let Err(e) = tokio::fs::create_dir_all(storage_dir).await {
            error!("Failed to create storage directory: {}", e);
            errors.push(StartupCheckError::StorageDirectoryCreationFailed(e));
        } else {
            info!("Storage directory created successfully");
        }
    } else if !storage_dir.is_dir() {
        error!("Storage path is not a directory: {:?}", storage_dir);
        errors.push(StartupCheckError::StorageNotADirectory(
            storage_dir.display().to_string(),
        ));
    } else {
        info!("Storage directory exists: {:?}", storage_dir);
    }

    // Extra font directories are optional; the resolver falls back to system fonts
    for font_dir in &config.fonts.directories {
        if font_dir.is_dir() {
            info!("Font directory exists: {:?}", font_dir);
        } else {
            warn!("Font directory does not exist: {:?}", font_dir);
            errors.push(StartupCheckError::FontDirectoryMissing(
                font_dir.display().to_string(),
            ));
        }
    }

    if config.export.jpeg_quality > 100 {
        warn!(
            "JPEG quality {} is above 100 and will be clamped",
            config.export.jpeg_quality
        );
        errors.push(StartupCheckError::InvalidExportSetting(format!(
            "jpeg_quality = {}",
            config.export.jpeg_quality
        )));
    }

    let naming = config.export.naming.to_lowercase();
    if !matches!(
        naming.as_str(),
        "original" | "keep-original" | "prefix" | "suffix"
    ) {
        warn!(
            "Unknown export naming {:?}, using suffix naming",
            config.export.naming
        );
        errors.push(StartupCheckError::InvalidExportSetting(format!(
            "naming = {:?}",
            config.export.naming
        )));
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
