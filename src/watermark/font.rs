//! Font resolution.
//!
//! A family name plus bold/italic flags resolves to a renderable face through a
//! fixed chain that never fails:
//!
//! 1. style-suffixed font files (`Family-BoldItalic.ttf`, ...) in the configured
//!    and well-known font directories
//! 2. the plain family through the system font database
//! 3. a fixed list of fallback families (CJK-capable first, then Latin)
//! 4. the built-in bitmap face

use ab_glyph::{FontVec, PxScale};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::bitmap_font;

/// Fallback families tried, in order, after the requested family.
pub const DEFAULT_FALLBACK_FAMILIES: &[&str] = &[
    "Microsoft YaHei",
    "SimHei",
    "Noto Sans CJK SC",
    "WenQuanYi Micro Hei",
    "PingFang SC",
    "Arial",
    "DejaVu Sans",
    "Liberation Sans",
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// Where a resolved face came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceSource {
    /// A style-suffixed file found by name
    File(PathBuf),
    /// The requested family through the system font database
    System(String),
    /// One of the fallback families
    Fallback(String),
    /// The built-in bitmap face
    Builtin,
}

/// A loaded outline font at a pixel size.
#[derive(Clone)]
pub struct OutlineFace {
    pub(crate) font: Arc<FontVec>,
    pub(crate) scale: PxScale,
}

impl fmt::Debug for OutlineFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutlineFace")
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// The bitmap face, drawn at an integer multiple of its 5x8 cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapFace {
    pub pixel_scale: u32,
}

impl BitmapFace {
    /// Largest cell multiple drawn; one cell row then spans 16384 pixels.
    pub const MAX_PIXEL_SCALE: u32 = 2048;

    pub fn for_size(size_px: u32) -> Self {
        let scale = (size_px as f32 / bitmap_font::CELL_HEIGHT as f32).round() as u32;
        Self {
            pixel_scale: scale.clamp(1, Self::MAX_PIXEL_SCALE),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FaceKind {
    Outline(OutlineFace),
    Bitmap(BitmapFace),
}

/// A face ready for measuring and drawing.
#[derive(Debug, Clone)]
pub struct FontFace {
    pub kind: FaceKind,
    pub source: FaceSource,
}

impl FontFace {
    pub fn builtin(size_px: u32) -> Self {
        Self {
            kind: FaceKind::Bitmap(BitmapFace::for_size(size_px)),
            source: FaceSource::Builtin,
        }
    }

    fn outline(font: Arc<FontVec>, size_px: u32, source: FaceSource) -> Self {
        Self {
            kind: FaceKind::Outline(OutlineFace {
                font,
                scale: PxScale::from(size_px.max(1) as f32),
            }),
            source,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, FaceKind::Bitmap(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceKey {
    bold: bool,
    italic: bool,
}

/// Resolves families to faces, caching loaded font data across calls.
pub struct FontResolver {
    search_dirs: Vec<PathBuf>,
    fallback_families: Vec<String>,
    use_system_fonts: bool,
    file_index: OnceLock<HashMap<String, PathBuf>>,
    database: OnceLock<fontdb::Database>,
    loaded: Mutex<HashMap<(String, FaceKey), Option<(Arc<FontVec>, FaceSource)>>>,
}

impl fmt::Debug for FontResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontResolver")
            .field("search_dirs", &self.search_dirs)
            .field("fallback_families", &self.fallback_families)
            .field("use_system_fonts", &self.use_system_fonts)
            .finish_non_exhaustive()
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl FontResolver {
    /// Resolver over `extra_dirs` plus the platform font directories.
    ///
    /// An empty `fallback_families` keeps [`DEFAULT_FALLBACK_FAMILIES`].
    pub fn new(extra_dirs: Vec<PathBuf>, fallback_families: Vec<String>) -> Self {
        let mut search_dirs = extra_dirs;
        search_dirs.extend(well_known_font_dirs());

        let fallback_families = if fallback_families.is_empty() {
            DEFAULT_FALLBACK_FAMILIES
                .iter()
                .map(|f| f.to_string())
                .collect()
        } else {
            fallback_families
        };

        Self {
            search_dirs,
            fallback_families,
            use_system_fonts: true,
            file_index: OnceLock::new(),
            database: OnceLock::new(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver limited to the given directories, without the system database.
    pub fn with_dirs_only(dirs: Vec<PathBuf>, fallback_families: Vec<String>) -> Self {
        Self {
            search_dirs: dirs,
            fallback_families,
            use_system_fonts: false,
            file_index: OnceLock::new(),
            database: OnceLock::new(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver that always yields the built-in bitmap face.
    pub fn builtin_only() -> Self {
        Self::with_dirs_only(Vec::new(), Vec::new())
    }

    pub fn from_config(config: &crate::FontConfig) -> Self {
        Self::new(
            config.directories.clone(),
            config.fallback_families.clone(),
        )
    }

    /// Resolve a face. Never fails; the bitmap face is the last resort.
    pub fn resolve(&self, family: &str, bold: bool, italic: bool, size_px: u32) -> FontFace {
        let key = (family.trim().to_lowercase(), FaceKey { bold, italic });

        let cached = {
            let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            loaded.get(&key).cloned()
        };

        let entry = match cached {
            Some(entry) => entry,
            None => {
                let entry = self.load(family.trim(), bold, italic);
                self.loaded
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, entry.clone());
                entry
            }
        };

        match entry {
            Some((font, source)) => FontFace::outline(font, size_px, source),
            None => FontFace::builtin(size_px),
        }
    }

    fn load(&self, family: &str, bold: bool, italic: bool) -> Option<(Arc<FontVec>, FaceSource)> {
        if !family.is_empty() {
            if let Some(found) = self.load_styled_file(family, bold, italic) {
                return Some(found);
            }

            if let Some(font) = self.load_system_family(family, bold, italic) {
                debug!("Resolved font family {:?} through system database", family);
                return Some((font, FaceSource::System(family.to_string())));
            }
        }

        for fallback in &self.fallback_families {
            let from_file = self
                .load_styled_file(fallback, bold, italic)
                .map(|(font, _)| font);
            let font = from_file.or_else(|| self.load_system_family(fallback, bold, italic));
            if let Some(font) = font {
                info!(
                    "Font family {:?} unavailable, using fallback {:?}",
                    family, fallback
                );
                return Some((font, FaceSource::Fallback(fallback.clone())));
            }
        }

        warn!(
            "No outline font found for {:?} or any fallback, using built-in bitmap face",
            family
        );
        None
    }

    fn load_styled_file(
        &self,
        family: &str,
        bold: bool,
        italic: bool,
    ) -> Option<(Arc<FontVec>, FaceSource)> {
        let index = self
            .file_index
            .get_or_init(|| index_font_files(&self.search_dirs));

        for stem in styled_file_stems(family, bold, italic) {
            let Some(path) = index.get(&stem) else {
                continue;
            };
            match load_font_file(path) {
                Ok(font) => {
                    debug!("Resolved font {:?} from file {:?}", family, path);
                    return Some((Arc::new(font), FaceSource::File(path.clone())));
                }
                Err(e) => warn!("Failed to load font file {:?}: {}", path, e),
            }
        }

        None
    }

    fn load_system_family(&self, family: &str, bold: bool, italic: bool) -> Option<Arc<FontVec>> {
        if !self.use_system_fonts {
            return None;
        }

        let database = self.database.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            for dir in &self.search_dirs {
                if dir.is_dir() {
                    db.load_fonts_dir(dir);
                }
            }
            debug!("Loaded {} font faces into system database", db.len());
            db
        });

        let families = [fontdb::Family::Name(family)];
        let query = fontdb::Query {
            families: &families,
            weight: if bold {
                fontdb::Weight::BOLD
            } else {
                fontdb::Weight::NORMAL
            },
            stretch: fontdb::Stretch::Normal,
            style: if italic {
                fontdb::Style::Italic
            } else {
                fontdb::Style::Normal
            },
        };

        let id = database.query(&query)?;
        database
            .with_face_data(id, |data, index| {
                FontVec::try_from_vec_and_index(data.to_vec(), index).ok()
            })
            .flatten()
            .map(Arc::new)
    }
}

/// Resolve through a process-wide resolver using only the platform directories.
pub fn resolve_font(family: &str, bold: bool, italic: bool, size_px: u32) -> FontFace {
    static RESOLVER: OnceLock<FontResolver> = OnceLock::new();
    RESOLVER
        .get_or_init(FontResolver::default)
        .resolve(family, bold, italic, size_px)
}

/// Lowercased file stems to look for, most specific first.
fn styled_file_stems(family: &str, bold: bool, italic: bool) -> Vec<String> {
    let compact: String = family.split_whitespace().collect();
    let suffix = match (bold, italic) {
        (true, true) => "BoldItalic",
        (true, false) => "Bold",
        (false, true) => "Italic",
        (false, false) => "Regular",
    };

    let mut stems = vec![
        format!("{}-{}", family, suffix),
        format!("{}-{}", compact, suffix),
        format!("{}{}", compact, suffix),
    ];
    if !bold && !italic {
        stems.push(family.to_string());
        stems.push(compact);
    }

    let mut seen = Vec::new();
    for stem in stems.into_iter().map(|s| s.to_lowercase()) {
        if !seen.contains(&stem) {
            seen.push(stem);
        }
    }
    seen
}

fn index_font_files(dirs: &[PathBuf]) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();

    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir)
            .max_depth(4)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FONT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if !is_font {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                index
                    .entry(stem.to_lowercase())
                    .or_insert_with(|| path.to_path_buf());
            }
        }
    }

    debug!("Indexed {} font files", index.len());
    index
}

fn load_font_file(path: &Path) -> Result<FontVec, Box<dyn std::error::Error>> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|_| "Failed to parse font")?;
    Ok(font)
}

fn well_known_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        let windir = std::env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
        dirs.push(PathBuf::from(windir).join("Fonts"));
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Microsoft\\Windows\\Fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    dirs
}
