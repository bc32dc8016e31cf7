//! Input discovery and output naming.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::export::NamingPolicy;
use crate::watermark::OutputFormat;

/// Lowercase extensions accepted as watermark sources.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "tif"];

pub fn is_supported_image(path: &Path) -> bool {
    extension_lowercase(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Expand files and folders into a list of supported images.
///
/// Folders are walked recursively and their contents sorted by path. Explicit
/// files keep their given order. Unsupported or missing entries are skipped.
pub fn collect_images(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable entry under {:?}: {}", input, e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file() && is_supported_image(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            debug!("Found {} images under {:?}", found.len(), input);
            images.extend(found);
        } else if input.is_file() && is_supported_image(input) {
            images.push(input.clone());
        } else {
            warn!("Skipping unsupported input {:?}", input);
        }
    }

    images
}

/// File name for the exported copy of `original`.
///
/// The source extension is kept when it already names `format`; otherwise the
/// format's own extension is used.
pub fn output_filename(original: &Path, naming: &NamingPolicy, format: OutputFormat) -> Option<String> {
    let stem = original.file_stem()?.to_string_lossy();
    let name = match naming {
        NamingPolicy::KeepOriginal => stem.to_string(),
        NamingPolicy::Prefix(prefix) => format!("{}{}", prefix, stem),
        NamingPolicy::Suffix(suffix) => format!("{}{}", stem, suffix),
    };

    let extension = match original.extension().and_then(|e| e.to_str()) {
        Some(ext) if extension_matches(ext, format) => ext.to_string(),
        _ => format.extension().to_string(),
    };

    Some(format!("{}.{}", name, extension))
}

pub fn output_path(
    original: &Path,
    output_dir: &Path,
    naming: &NamingPolicy,
    format: OutputFormat,
) -> Option<PathBuf> {
    output_filename(original, naming, format).map(|name| output_dir.join(name))
}

fn extension_matches(extension: &str, format: OutputFormat) -> bool {
    let extension = extension.to_lowercase();
    match format {
        OutputFormat::Jpeg => extension == "jpg" || extension == "jpeg",
        OutputFormat::Png => extension == "png",
    }
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_image(Path::new("a/b/photo.JPG")));
        assert!(is_supported_image(Path::new("scan.tif")));
        assert!(is_supported_image(Path::new("x.Png")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("image.webp")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn test_output_filename_policies() {
        let original = Path::new("/photos/beach.jpg");
        assert_eq!(
            output_filename(original, &NamingPolicy::KeepOriginal, OutputFormat::Jpeg).unwrap(),
            "beach.jpg"
        );
        assert_eq!(
            output_filename(original, &NamingPolicy::Prefix("wm_".into()), OutputFormat::Jpeg)
                .unwrap(),
            "wm_beach.jpg"
        );
        assert_eq!(
            output_filename(
                original,
                &NamingPolicy::Suffix("_watermark".into()),
                OutputFormat::Jpeg
            )
            .unwrap(),
            "beach_watermark.jpg"
        );
    }

    #[test]
    fn test_format_extension_wins_on_mismatch() {
        let suffix = NamingPolicy::Suffix("_watermark".into());
        assert_eq!(
            output_filename(Path::new("photo.png"), &suffix, OutputFormat::Jpeg).unwrap(),
            "photo_watermark.jpg"
        );
        assert_eq!(
            output_filename(Path::new("photo.JPEG"), &suffix, OutputFormat::Jpeg).unwrap(),
            "photo_watermark.JPEG"
        );
        assert_eq!(
            output_filename(Path::new("photo.bmp"), &suffix, OutputFormat::Png).unwrap(),
            "photo_watermark.png"
        );
    }

    #[test]
    fn test_collect_images_walks_folders_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
        for name in ["b.png", "a.JPG", "readme.md", "nested/c.tiff", "nested/deeper/d.gif"] {
            std::fs::write(root.join(name), b"").unwrap();
        }
        let loose = root.join("nested/c.tiff");

        let images = collect_images(&[root.to_path_buf(), loose.clone(), root.join("missing.png")]);
        let names: Vec<_> = images
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(
            names,
            vec!["a.JPG", "b.png", "nested/c.tiff", "nested/deeper/d.gif", "nested/c.tiff"]
        );
    }
}
