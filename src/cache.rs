//! Photo metadata cache for incremental builds.
//!
//! Reading EXIF, IPTC and XMP means reading every source file in full. This
//! module lets a run skip that work for photos that have not changed since
//! the previous run.
//!
//! # Design
//!
//! Entries are grouped per gallery and keyed by **source path**. A cached
//! [`PhotoRecord`] stores the source file's modification time, and a lookup
//! only hits when that time equals the file's current modification time.
//! Each entry also keeps the [`RecordParams`] it was built under (crop
//! canvas, preview image); a lookup under different params misses. Anything
//! else (touched file, replaced file, missing entry) is a miss too and the
//! photo is extracted again.
//!
//! The cache is read-only while a run is in progress: each gallery gets its
//! own [`GalleryCache`] from the previous run. At the end of the run the
//! galleries that generated successfully replace their old entries and the
//! whole file is written once.
//!
//! ## Storage
//!
//! JSON at `<destination>/.photosite-cache.json`. A missing, corrupt or
//! version-mismatched file loads as an empty cache.
//!
//! ## Bypassing the cache
//!
//! `build --no-cache` starts from an empty cache, so every photo is extracted.

use crate::metadata::PhotoRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the cache file within the destination directory.
const CACHE_FILENAME: &str = ".photosite-cache.json";

/// Bump to invalidate every existing cache when `PhotoRecord` changes shape.
const CACHE_VERSION: u32 = 2;

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Run settings a record's derived fields were computed under.
///
/// The crop preview is scaled to the crop canvas and points at the reduced
/// copy when one exists, so a record built under other settings is stale
/// even when its source file is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordParams {
    pub crop_canvas: f64,
    /// Site-relative image the crop preview shows.
    pub preview_src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheEntry {
    params: RecordParams,
    record: PhotoRecord,
}

/// Cached records of one gallery, keyed by source path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalleryCache {
    photos: BTreeMap<String, CacheEntry>,
}

impl GalleryCache {
    /// Store `record` as built under `params`, replacing any entry for the
    /// same source path.
    pub fn insert(&mut self, record: PhotoRecord, params: RecordParams) {
        self.photos
            .insert(key(&record.path), CacheEntry { params, record });
    }

    /// The cached record for `path`, if it was extracted from a file with
    /// exactly this modification time under the same `params`.
    pub fn lookup(
        &self,
        path: &Path,
        modified: SystemTime,
        params: &RecordParams,
    ) -> Option<&PhotoRecord> {
        self.photos
            .get(&key(path))
            .filter(|entry| entry.record.modified == modified && entry.params == *params)
            .map(|entry| &entry.record)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.photos.values().map(|entry| &entry.record)
    }
}

/// On-disk cache: gallery name → [`GalleryCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoCache {
    pub version: u32,
    pub galleries: BTreeMap<String, GalleryCache>,
}

impl Default for PhotoCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl PhotoCache {
    /// Create an empty cache (used for `--no-cache` or the first build).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            galleries: BTreeMap::new(),
        }
    }

    /// Load from the destination directory. Returns an empty cache if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(destination: &Path) -> Self {
        let content = match std::fs::read_to_string(cache_path(destination)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("ignoring unreadable photo cache: {e}");
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            return Self::empty();
        }
        cache
    }

    /// Save to the destination directory.
    pub fn save(&self, destination: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(cache_path(destination), json)
    }

    /// Previous-run records of one gallery (empty when unknown).
    pub fn gallery(&self, name: &str) -> GalleryCache {
        self.galleries.get(name).cloned().unwrap_or_default()
    }

    /// Replace a gallery's entries with this run's records.
    pub fn replace_gallery(&mut self, name: &str, gallery: GalleryCache) {
        self.galleries.insert(name.to_string(), gallery);
    }

    /// Camera model → first photo (in path order) taken with it.
    pub fn cameras(&self) -> BTreeMap<String, PathBuf> {
        let mut cameras = BTreeMap::new();
        for record in self.galleries.values().flat_map(GalleryCache::records) {
            if let Some(model) = &record.camera {
                cameras
                    .entry(model.clone())
                    .or_insert_with(|| record.path.clone());
            }
        }
        cameras
    }

    pub fn photo_count(&self) -> usize {
        self.galleries.values().map(GalleryCache::len).sum()
    }
}

/// Resolve the cache file path for a destination directory.
pub fn cache_path(destination: &Path) -> PathBuf {
    destination.join(CACHE_FILENAME)
}

/// Summary of cache performance for a gallery or a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }

    pub fn add(&mut self, other: CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} extracted ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} extracted", self.misses)
        }
    }
}
