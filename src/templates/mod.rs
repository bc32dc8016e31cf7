//! Named style templates and the two singleton settings records.
//!
//! Layout under the storage directory:
//!
//! ```text
//! templates/<name>.json    {name, created_at, settings}
//! last_settings.json       settings saved after every successful apply
//! default_template.json    settings chosen by the user as the default
//! ```

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

use serde::{Serialize, de::DeserializeOwned};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::watermark::StyleDescriptor;

const TEMPLATES_DIR: &str = "templates";
const LAST_SETTINGS_FILE: &str = "last_settings.json";
const DEFAULT_TEMPLATE_FILE: &str = "default_template.json";

#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// Store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &crate::StorageConfig) -> Self {
        Self::new(&config.directory)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    fn template_path(&self, name: &str) -> Result<PathBuf, TemplateError> {
        validate_name(name)?;
        Ok(self.templates_dir().join(format!("{}.json", name)))
    }

    pub fn save_template(
        &self,
        name: &str,
        settings: &StyleDescriptor,
    ) -> Result<TemplateRecord, TemplateError> {
        let path = self.template_path(name)?;
        let record = TemplateRecord::new(name, settings.clone());
        write_json(&path, &record)?;
        info!("Saved template {:?}", name);
        Ok(record)
    }

    pub fn load_record(&self, name: &str) -> Result<TemplateRecord, TemplateError> {
        let path = self.template_path(name)?;
        read_json(&path)?.ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    pub fn load_template(&self, name: &str) -> Result<StyleDescriptor, TemplateError> {
        Ok(self.load_record(name)?.settings)
    }

    /// Remove a template. Returns `false` when it did not exist.
    pub fn delete_template(&self, name: &str) -> Result<bool, TemplateError> {
        let path = self.template_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted template {:?}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Template names in ascending order.
    pub fn list_templates(&self) -> Result<Vec<String>, TemplateError> {
        let dir = self.templates_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_json = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if !path.is_file() || !is_json {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn save_last_settings(&self, settings: &StyleDescriptor) -> Result<(), TemplateError> {
        write_json(&self.root.join(LAST_SETTINGS_FILE), settings)?;
        debug!("Saved last settings");
        Ok(())
    }

    pub fn load_last_settings(&self) -> Result<Option<StyleDescriptor>, TemplateError> {
        read_json(&self.root.join(LAST_SETTINGS_FILE))
    }

    pub fn save_default_template(&self, settings: &StyleDescriptor) -> Result<(), TemplateError> {
        write_json(&self.root.join(DEFAULT_TEMPLATE_FILE), settings)?;
        info!("Saved default template");
        Ok(())
    }

    pub fn load_default_template(&self) -> Result<Option<StyleDescriptor>, TemplateError> {
        read_json(&self.root.join(DEFAULT_TEMPLATE_FILE))
    }

    /// Settings to start with: last settings, else the default template, else built-in defaults.
    ///
    /// Unreadable records are logged and skipped.
    pub fn startup_settings(&self) -> StyleDescriptor {
        self.startup_settings_or(StyleDescriptor::default())
    }

    /// Like [`startup_settings`](Self::startup_settings) with `fallback` as the last resort.
    pub fn startup_settings_or(&self, fallback: StyleDescriptor) -> StyleDescriptor {
        let candidates = [
            ("last settings", self.load_last_settings()),
            ("default template", self.load_default_template()),
        ];

        for (label, loaded) in candidates {
            match loaded {
                Ok(Some(settings)) => {
                    debug!("Starting from {}", label);
                    return settings;
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable {}: {}", label, e),
            }
        }

        fallback
    }
}

/// Template names become file names, so they must stay inside the templates directory.
fn validate_name(name: &str) -> Result<(), TemplateError> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);

    if invalid {
        return Err(TemplateError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TemplateError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    temp.persist(path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, TemplateError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}
