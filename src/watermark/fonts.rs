//! Font lookup for text watermarks.
//!
//! Resolves CSS-style `font-family` lists (`"Arial, sans-serif"`) to font
//! files on disk. Each entry is tried in order:
//!
//! 1. an explicit path from `fonts.families` in the config
//! 2. a file under the search directories whose stem matches the family
//!    (case-insensitive, ignoring spaces, dashes and underscores)
//!
//! Generic families (`sans-serif`, `serif`, `monospace`) expand to a list of
//! well-known font files, CJK-capable faces first so the default brand
//! line renders.
//!
//! [`FontBook::resolve_all`] keeps every match instead of stopping at the
//! first, so rendering can fall back per character (a Latin-only face
//! followed by a CJK one still draws the default brand line).
//!
//! Loaded fonts are kept for the lifetime of the [`FontBook`].

use super::WatermarkError;
use ab_glyph::{FontArc, FontVec};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

const SANS_SERIF: &[&str] = &[
    "NotoSansCJK-Regular",
    "NotoSansSC-Regular",
    "wqy-microhei",
    "DejaVuSans",
    "LiberationSans-Regular",
    "Arial",
    "Helvetica",
];

const SERIF: &[&str] = &[
    "NotoSerifCJK-Regular",
    "DejaVuSerif",
    "LiberationSerif-Regular",
    "Times New Roman",
    "Times",
];

const MONOSPACE: &[&str] = &[
    "DejaVuSansMono",
    "LiberationMono-Regular",
    "Courier New",
    "Menlo",
];

fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = [
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "/Library/Fonts",
        "/System/Library/Fonts",
        "C:\\Windows\\Fonts",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
    }

    dirs
}

/// Font lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    /// Explicit family -> font file mappings, checked before the search dirs
    #[serde(default)]
    pub families: HashMap<String, PathBuf>,

    /// Directories scanned (recursively) for font files
    #[serde(default = "default_search_dirs")]
    pub search_dirs: Vec<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            families: HashMap::new(),
            search_dirs: default_search_dirs(),
        }
    }
}

/// Lowercase and drop separators so `"DejaVu Sans"` matches `DejaVuSans.ttf`.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '"' | '\''))
        .flat_map(char::to_lowercase)
        .collect()
}

fn generic_candidates(family: &str) -> Option<&'static [&'static str]> {
    match family {
        "sansserif" | "systemui" | "cursive" | "fantasy" => Some(SANS_SERIF),
        "serif" => Some(SERIF),
        "monospace" => Some(MONOSPACE),
        _ => None,
    }
}

/// Resolves and caches fonts by family name.
pub struct FontBook {
    families: HashMap<String, PathBuf>,
    search_dirs: Vec<PathBuf>,
    index: OnceLock<HashMap<String, PathBuf>>,
    loaded: Mutex<HashMap<PathBuf, FontArc>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.families)
            .field("search_dirs", &self.search_dirs)
            .field("loaded", &self.loaded.lock().len())
            .finish()
    }
}

impl FontBook {
    pub fn new(config: &FontConfig) -> Self {
        let families = config
            .families
            .iter()
            .map(|(name, path)| (normalize(name), path.clone()))
            .collect();

        Self {
            families,
            search_dirs: config.search_dirs.clone(),
            index: OnceLock::new(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the first loadable font in a comma separated family list.
    pub fn resolve(&self, family_list: &str) -> Result<FontArc, WatermarkError> {
        self.resolve_all(family_list)
            .map(|fonts| fonts.into_iter().next())?
            .ok_or_else(|| no_font(family_list))
    }

    /// Every loadable font for a family list, in preference order.
    ///
    /// Text rendering draws each character with the first of these that has
    /// a glyph for it. Fails when none of the families resolves.
    pub fn resolve_all(&self, family_list: &str) -> Result<Vec<FontArc>, WatermarkError> {
        let mut seen: Vec<PathBuf> = Vec::new();
        let mut fonts = Vec::new();

        for family in family_list.split(',') {
            let key = normalize(family);
            if key.is_empty() {
                continue;
            }

            if let Some(path) = self.families.get(&key) {
                if !seen.contains(path) {
                    seen.push(path.clone());
                    match self.load(path) {
                        Ok(font) => fonts.push(font),
                        Err(e) => {
                            tracing::warn!(
                                family = %family.trim(),
                                path = %path.display(),
                                error = %e,
                                "Configured font failed to load"
                            );
                        }
                    }
                }
            }

            for path in self.installed_paths(&key) {
                if seen.contains(&path) {
                    continue;
                }
                match self.load(&path) {
                    Ok(font) => fonts.push(font),
                    Err(e) => {
                        tracing::debug!(
                            path = %path.display(),
                            error = %e,
                            "Skipping unreadable font"
                        );
                    }
                }
                seen.push(path);
            }
        }

        if fonts.is_empty() {
            return Err(no_font(family_list));
        }
        Ok(fonts)
    }

    fn installed_paths(&self, key: &str) -> Vec<PathBuf> {
        let index = self.index();
        let candidates: Vec<String> = match generic_candidates(key) {
            Some(names) => names.iter().map(|n| normalize(n)).collect(),
            None => vec![key.to_string(), format!("{}regular", key)],
        };

        candidates
            .iter()
            .filter_map(|candidate| index.get(candidate).cloned())
            .collect()
    }

    fn index(&self) -> &HashMap<String, PathBuf> {
        self.index.get_or_init(|| {
            let mut index = HashMap::new();
            for dir in &self.search_dirs {
                for entry in WalkDir::new(dir)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    let path = entry.path();
                    if !is_font_file(path) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        index
                            .entry(normalize(stem))
                            .or_insert_with(|| path.to_path_buf());
                    }
                }
            }
            tracing::debug!(fonts = index.len(), "Indexed installed fonts");
            index
        })
    }

    fn load(&self, path: &Path) -> Result<FontArc, WatermarkError> {
        if let Some(font) = self.loaded.lock().get(path) {
            return Ok(font.clone());
        }

        let data = std::fs::read(path).map_err(|e| {
            WatermarkError::render(format!("cannot read font {}: {}", path.display(), e))
        })?;

        // Collections carry several faces; the first is the regular one.
        let font = FontVec::try_from_vec_and_index(data, 0)
            .map(FontArc::new)
            .map_err(|e| {
                WatermarkError::render(format!("invalid font {}: {}", path.display(), e))
            })?;

        self.loaded
            .lock()
            .insert(path.to_path_buf(), font.clone());
        Ok(font)
    }
}

fn no_font(family_list: &str) -> WatermarkError {
    WatermarkError::render(format!("no font found for family '{}'", family_list))
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
