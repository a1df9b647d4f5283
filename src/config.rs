//! Site configuration module.
//!
//! Handles loading, validating, and merging `site.toml`. Stock defaults are
//! serialized to a TOML table, the user's file is merged on top, and the
//! result is deserialized and validated.
//!
//! ## Config File Location
//!
//! ```text
//! photos/
//! ├── site.toml                # Site config (overrides stock defaults)
//! ├── static/                  # Copied to the output root
//! └── galleries/
//!     ├── 2011MachuPicchu/     # One folder per [[gallery]] entry
//!     └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! root_url = "https://photos.example.com"  # Sitemap base (no sitemap when absent)
//! galleries_dir = "galleries"
//! static_dir = "static"
//! categories = ["travel", "sports"]
//! clean_build = false
//! inline_webcomponent_css = false
//!
//! [thumbnails]
//! gallery_width = 20        # Sprite width for gallery walls
//! index_width = 16          # Sprite width for the index page
//! quality = 85              # Sprite JPEG quality (1-100)
//!
//! [crop]
//! canvas = 200.0            # Crop preview canvas size
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [[gallery]]
//! title = "Machu Picchu"
//! directory = "2011MachuPicchu"
//! title_image = "_MG_8665.jpg"
//! categories = ["travel"]
//! ```
//!
//! Galleries are displayed in the order they are listed. Unknown keys are
//! rejected to catch typos early.

use crate::naming::generation_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file inside the source directory.
pub const CONFIG_FILENAME: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Base URL for the sitemap; no sitemap is written without it.
    pub root_url: Option<String>,
    /// Folder holding one subfolder per gallery, relative to the source.
    pub galleries_dir: String,
    /// Static assets folder, relative to the source.
    pub static_dir: String,
    /// Declared categories; when non-empty, galleries may only use these.
    pub categories: Vec<String>,
    /// Delete the destination's contents before generating.
    pub clean_build: bool,
    /// Inline stylesheets referenced from `webcomponents.js`.
    pub inline_webcomponent_css: bool,
    pub thumbnails: ThumbnailsConfig,
    pub crop: CropConfig,
    pub processing: ProcessingConfig,
    #[serde(rename = "gallery")]
    pub galleries: Vec<GalleryConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_url: None,
            galleries_dir: "galleries".to_string(),
            static_dir: "static".to_string(),
            categories: Vec::new(),
            clean_build: false,
            inline_webcomponent_css: false,
            thumbnails: ThumbnailsConfig::default(),
            crop: CropConfig::default(),
            processing: ProcessingConfig::default(),
            galleries: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.gallery_width == 0 || self.thumbnails.index_width == 0 {
            return Err(ConfigError::Validation(
                "thumbnails widths must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if !(self.crop.canvas.is_finite() && self.crop.canvas > 0.0) {
            return Err(ConfigError::Validation(
                "crop.canvas must be a positive number".into(),
            ));
        }

        let declared: HashSet<&str> = self.categories.iter().map(String::as_str).collect();
        let mut names = HashSet::new();
        for (index, gallery) in self.galleries.iter().enumerate() {
            if gallery.title.trim().is_empty() || gallery.directory.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "gallery #{} needs a title and a directory",
                    index + 1
                )));
            }
            let name = gallery.gen_name();
            if name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "gallery directory '{}' has no usable characters",
                    gallery.directory
                )));
            }
            if !names.insert(name.clone()) {
                return Err(ConfigError::Validation(format!(
                    "two galleries generate as '{name}'"
                )));
            }
            if !declared.is_empty()
                && let Some(unknown) = gallery
                    .categories
                    .iter()
                    .find(|c| !declared.contains(c.as_str()))
            {
                return Err(ConfigError::Validation(format!(
                    "gallery '{}' uses undeclared category '{unknown}'",
                    gallery.title
                )));
            }
        }
        Ok(())
    }
}

/// One `[[gallery]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryConfig {
    pub title: String,
    /// Source folder under `galleries_dir`.
    pub directory: String,
    /// Filtered file name of the photo to feature.
    #[serde(default)]
    pub title_image: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl GalleryConfig {
    /// Generation-safe name used for output paths.
    pub fn gen_name(&self) -> String {
        generation_name(&self.directory)
    }
}

/// Sprite strip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub gallery_width: u32,
    pub index_width: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            gallery_width: 20,
            index_width: 16,
            quality: 85,
        }
    }
}

/// Crop preview settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Side of the square canvas crop geometry is normalized into.
    pub canvas: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self { canvas: 200.0 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a user's
///   `[[gallery]]` list replaces the (empty) default list.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `site.toml` in the source directory.
pub fn load_config(source: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(source)?)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photosite configuration
# =======================
# All settings except the [[gallery]] entries are optional.
# Values shown below are the defaults. Unknown keys cause an error.

# Base URL of the published site. sitemap.xml is only written when set.
# root_url = "https://photos.example.com"

# Folder (relative to this file) with one subfolder per gallery.
galleries_dir = "galleries"

# Folder (relative to this file) copied to the output root.
static_dir = "static"

# Allowed gallery categories. Leave empty to allow any.
categories = []

# Delete the output folder's contents before generating.
# The photo cache (.photosite-cache.json) is kept.
clean_build = false

# Replace <link rel=stylesheet> lines in js/webcomponents.js with the
# referenced stylesheet's contents.
inline_webcomponent_css = false

# ---------------------------------------------------------------------------
# Sprite strips
# ---------------------------------------------------------------------------
[thumbnails]
# Pixel width of the thumbnail strip behind each gallery wall.
gallery_width = 20

# Pixel width of the strip behind the index page.
index_width = 16

# JPEG quality of the strips (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Crop preview
# ---------------------------------------------------------------------------
[crop]
# Side of the square canvas crop outlines are drawn on.
canvas = 200.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Galleries, in display order
# ---------------------------------------------------------------------------
# [[gallery]]
# title = "Machu Picchu"
# directory = "2011MachuPicchu"
# title_image = "_MG_8665.jpg"
# categories = ["travel"]
"##
}
