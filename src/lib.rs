use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod export;
pub mod files;
pub mod interaction;
pub mod startup_checks;
pub mod templates;
pub mod watermark;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml_edit::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Per-user directory holding templates, last settings and the default template
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FontConfig {
    /// Extra directories searched for style-suffixed font files before the system ones
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Replaces the built-in fallback family chain when non-empty
    #[serde(default)]
    pub fallback_families: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output format for descriptors that start from the built-in defaults
    pub format: watermark::OutputFormat,
    /// JPEG quality for descriptors that start from the built-in defaults
    pub jpeg_quality: u8,
    pub naming: String,
    pub prefix: String,
    pub suffix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Photomark".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: watermark::OutputFormat::Png,
            jpeg_quality: 95,
            naming: "suffix".to_string(),
            prefix: "wm_".to_string(),
            suffix: "_watermark".to_string(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Ok(toml_edit::de::from_str::<Config>(&contents)?)
    }

    /// Built-in style with the configured output format and JPEG quality.
    ///
    /// Saved templates and last settings carry their own format and quality,
    /// so this only applies when neither exists.
    pub fn default_style(&self) -> watermark::StyleDescriptor {
        watermark::StyleDescriptor {
            output_format: self.export.format,
            quality: self.export.jpeg_quality.min(100),
            ..watermark::StyleDescriptor::default()
        }
    }

    /// Resolve the naming policy configured for exports
    pub fn naming_policy(&self) -> export::NamingPolicy {
        match self.export.naming.to_lowercase().as_str() {
            "original" | "keep-original" => export::NamingPolicy::KeepOriginal,
            "prefix" => export::NamingPolicy::Prefix(self.export.prefix.clone()),
            _ => export::NamingPolicy::Suffix(self.export.suffix.clone()),
        }
    }
}

fn default_storage_directory() -> PathBuf {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match home {
        Some(home) => PathBuf::from(home).join(".photo_watermark_tool"),
        None => PathBuf::from(".photo_watermark_tool"),
    }
}
