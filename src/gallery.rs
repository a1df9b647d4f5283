//! Per-gallery generation.
//!
//! One call to [`generate_gallery`] turns `<galleries>/<directory>/` into:
//!
//! ```text
//! <dest>/
//! ├── <gen>.html              # gallery wall
//! ├── thumbs/<gen>.jpg        # sprite strip, one row per photo
//! └── <gen>/
//!     ├── <photo>.jpg         # copied under its filtered name
//!     ├── <stem>.html         # info fragment per photo
//!     └── w0512/<photo>.jpg   # reduced copies, when the source has them
//! ```
//!
//! ## Steps
//!
//! 1. Count source photos to size the progress target
//! 2. Copy the source tree (filtered names, lower-cased `W\d+` dirs)
//! 3. Extract metadata for every copied photo in parallel, reusing
//!    previous-run records whose source mtime is unchanged
//! 4. Sort: title image, rating (high first), capture time, file name
//! 5. Pick the favorite, write info fragments, sprite and page
//!
//! The cancel token is polled after each copied file, before extraction
//! starts, per photo and after extraction. A photo that cannot be read is
//! logged to the gallery's status node and left out.

use crate::cache::{CacheStats, GalleryCache, RecordParams};
use crate::cancel::{CancelToken, Cancelled};
use crate::config::ThumbnailsConfig;
use crate::fsutil::{self, CopiedFile, CopyHooks, FsError};
use crate::imaging::{BackendError, ImageBackend, is_photo};
use crate::metadata::{Extractor, PhotoRecord, PhotoSource};
use crate::naming::{filtered_file_name, lowercase_width_dirs};
use crate::render::{self, GalleryPage, GenerationId};
use crate::sprite::{self, SpriteEntry, SpriteError};
use crate::status::{ErrorSink, GalleryReporter};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reduced-size copy directory used for thumbnails and crop previews.
pub const PREVIEW_DIR: &str = "w0512";

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Sprite generation failed: {0}")]
    Sprite(#[from] SpriteError),
    #[error("Copy failed: {0}")]
    Fs(FsError),
    #[error("no photos")]
    NoPhotos,
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<FsError> for GalleryError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Cancelled(c) => Self::Cancelled(c),
            FsError::Io(io) => Self::Io(io),
            other => Self::Fs(other),
        }
    }
}

/// A gallery to generate, as configured.
#[derive(Debug, Clone)]
pub struct GalleryInfo {
    /// Generation-safe name: output folder, page and sprite name.
    pub name: String,
    /// Display order.
    pub sequence: usize,
    pub title: String,
    /// Source folder under the galleries root.
    pub directory: String,
    pub categories: Vec<String>,
    /// Filtered file name of the photo to feature first.
    pub title_image: Option<String>,
    /// Records from the previous run.
    pub prior: GalleryCache,
}

/// A successfully generated gallery.
#[derive(Debug, Clone)]
pub struct GeneratedGallery {
    pub name: String,
    pub sequence: usize,
    pub title: String,
    pub categories: Vec<String>,
    /// Always one of `photos`.
    pub favorite: PhotoRecord,
    /// Display order.
    pub photos: Vec<PhotoRecord>,
    /// This run's records for the next run's cache.
    pub cache: GalleryCache,
    pub stats: CacheStats,
}

/// Run-wide inputs shared by every gallery.
pub struct GenerationContext<'a> {
    pub id: &'a GenerationId,
    pub galleries_root: &'a Path,
    pub destination: &'a Path,
    pub backend: &'a dyn ImageBackend,
    pub thumbnails: &'a ThumbnailsConfig,
    pub crop_canvas: f64,
    pub cancel: &'a CancelToken,
}

/// Generate one gallery and move its status node to a terminal state.
///
/// `Cancelled` marks the node cancelled; any other error is logged to the
/// node before it completes.
pub fn generate_gallery(
    info: &GalleryInfo,
    ctx: &GenerationContext,
    reporter: GalleryReporter,
) -> Result<GeneratedGallery, GalleryError> {
    tracing::info!(gallery = %info.name, "generating");
    let result = run(info, ctx, reporter);
    match &result {
        Ok(gallery) => {
            tracing::info!(gallery = %info.name, photos = gallery.photos.len(), "done");
        }
        Err(GalleryError::Cancelled(_)) => reporter.cancelled(),
        Err(e) => reporter.handle_error("generation", e),
    }
    reporter.complete();
    result
}

fn run(
    info: &GalleryInfo,
    ctx: &GenerationContext,
    reporter: GalleryReporter,
) -> Result<GeneratedGallery, GalleryError> {
    let source_dir = ctx.galleries_root.join(&info.directory);
    let dest_dir = ctx.destination.join(&info.name);

    ctx.cancel.check()?;
    reporter.start(fsutil::count_files(&source_dir, is_photo).unwrap_or(0));

    let hooks = CopyHooks {
        rename: filtered_file_name,
        dir_filter: lowercase_width_dirs,
        ..CopyHooks::default()
    };
    let copied = fsutil::copy_directory(
        &source_dir,
        &dest_dir,
        hooks,
        &reporter,
        &format!("Copying images for gallery {}", info.name),
        ctx.cancel,
    )?;
    let photos = unique_photos(copied);
    for _ in &photos {
        reporter.progress_tick();
    }

    ctx.cancel.check()?;
    let (mut records, cache, stats) = extract_all(info, ctx, &dest_dir, &photos, reporter)?;
    ctx.cancel.check()?;

    if records.is_empty() {
        return Err(GalleryError::NoPhotos);
    }
    sort_photos(&mut records, info.title_image.as_deref());
    let favorite = select_favorite(&records, info.title_image.as_deref(), &reporter).clone();

    for record in &records {
        let fragment = render::info_fragment(record).into_string();
        fsutil::write_atomic(
            &dest_dir.join(format!("{}.html", record.stem())),
            fragment.as_bytes(),
        )?;
    }

    let entries: Vec<SpriteEntry> = records
        .iter()
        .map(|r| SpriteEntry {
            source: thumbnail_source(&dest_dir, &r.file_name),
            aspect_ratio: r.aspect_ratio,
        })
        .collect();
    let strip = sprite::compose(ctx.backend, &entries, ctx.thumbnails.gallery_width, &reporter)?;
    let jpeg = sprite::encode_jpeg(&strip.image, ctx.thumbnails.quality)?;
    fsutil::write_atomic(
        &ctx.destination
            .join("thumbs")
            .join(format!("{}.jpg", info.name)),
        &jpeg,
    )?;

    let page = render::gallery_page(&GalleryPage {
        id: ctx.id,
        gen_name: &info.name,
        title: &info.title,
        photos: &records,
        slots: &strip.layout.slots,
    });
    fsutil::write_atomic(
        &ctx.destination.join(format!("{}.html", info.name)),
        page.into_string().as_bytes(),
    )?;

    reporter.log_message(&format!("{} photos ({stats})", records.len()));

    Ok(GeneratedGallery {
        name: info.name.clone(),
        sequence: info.sequence,
        title: info.title.clone(),
        categories: info.categories.clone(),
        favorite,
        photos: records,
        cache,
        stats,
    })
}

/// Top-level photos, one per destination; the later source wins a
/// duplicate name, like the copy itself.
fn unique_photos(copied: Vec<CopiedFile>) -> Vec<CopiedFile> {
    let by_dest: BTreeMap<PathBuf, CopiedFile> = copied
        .into_iter()
        .filter(|f| is_photo(&f.dest))
        .map(|f| (f.dest.clone(), f))
        .collect();
    by_dest.into_values().collect()
}

fn extract_all(
    info: &GalleryInfo,
    ctx: &GenerationContext,
    dest_dir: &Path,
    photos: &[CopiedFile],
    reporter: GalleryReporter,
) -> Result<(Vec<PhotoRecord>, GalleryCache, CacheStats), GalleryError> {
    let extractor = Extractor {
        backend: ctx.backend,
        canvas: ctx.crop_canvas,
    };

    let results: Vec<Option<Extracted>> = photos
        .par_iter()
        .map(|file| -> Result<_, GalleryError> {
            ctx.cancel.check()?;
            let outcome = extract_one(info, &extractor, dest_dir, file, reporter)?;
            reporter.progress_tick();
            Ok(outcome)
        })
        .collect::<Result<_, _>>()?;

    let mut stats = CacheStats::default();
    let mut records = Vec::with_capacity(results.len());
    let mut cache = GalleryCache::default();
    for extracted in results.into_iter().flatten() {
        if extracted.cached {
            stats.hit();
        } else {
            stats.miss();
        }
        cache.insert(extracted.record.clone(), extracted.params);
        records.push(extracted.record);
    }
    Ok((records, cache, stats))
}

struct Extracted {
    record: PhotoRecord,
    params: RecordParams,
    cached: bool,
}

/// `None` when the photo was skipped.
fn extract_one(
    info: &GalleryInfo,
    extractor: &Extractor,
    dest_dir: &Path,
    file: &CopiedFile,
    reporter: GalleryReporter,
) -> Result<Option<Extracted>, GalleryError> {
    let modified = std::fs::metadata(&file.source)?.modified()?;
    let file_name = file
        .dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let params = RecordParams {
        crop_canvas: extractor.canvas,
        preview_src: preview_src(&info.name, dest_dir, &file_name),
    };

    if let Some(record) = info.prior.lookup(&file.source, modified, &params) {
        tracing::debug!(gallery = %info.name, path = %file.source.display(), "cache hit");
        return Ok(Some(Extracted {
            record: record.clone(),
            params,
            cached: true,
        }));
    }

    let source = PhotoSource {
        path: file.source.clone(),
        modified,
        file_name: file_name.clone(),
        preview_src: params.preview_src.clone(),
    };
    match extractor.extract(&source, &reporter) {
        Ok(record) => Ok(Some(Extracted {
            record,
            params,
            cached: false,
        })),
        Err(e) => {
            reporter.handle_error(&format!("reading {file_name}"), &e);
            Ok(None)
        }
    }
}

fn has_preview(dest_dir: &Path, file_name: &str) -> bool {
    dest_dir.join(PREVIEW_DIR).join(file_name).is_file()
}

/// Site-relative image used for the crop preview.
fn preview_src(gen_name: &str, dest_dir: &Path, file_name: &str) -> String {
    if has_preview(dest_dir, file_name) {
        format!("{gen_name}/{PREVIEW_DIR}/{file_name}")
    } else {
        format!("{gen_name}/{file_name}")
    }
}

/// File the sprite row is drawn from: the reduced copy when present.
pub fn thumbnail_source(dest_dir: &Path, file_name: &str) -> PathBuf {
    if has_preview(dest_dir, file_name) {
        dest_dir.join(PREVIEW_DIR).join(file_name)
    } else {
        dest_dir.join(file_name)
    }
}

fn display_order(a: &PhotoRecord, b: &PhotoRecord) -> Ordering {
    b.rating
        .cmp(&a.rating)
        .then_with(|| {
            a.capture_time
                .as_deref()
                .unwrap_or("")
                .cmp(b.capture_time.as_deref().unwrap_or(""))
        })
        .then_with(|| a.file_name.cmp(&b.file_name))
}

/// Title image first, then rating descending, capture time ascending,
/// file name ascending. Photos without a capture time sort as earliest.
pub fn sort_photos(photos: &mut [PhotoRecord], title_image: Option<&str>) {
    let is_title = |p: &PhotoRecord| Some(p.file_name.as_str()) == title_image;
    photos.sort_by(|a, b| {
        is_title(b)
            .cmp(&is_title(a))
            .then_with(|| display_order(a, b))
    });
}

/// The titled photo when configured and present, otherwise the first.
///
/// `photos` must not be empty.
pub fn select_favorite<'a>(
    photos: &'a [PhotoRecord],
    title_image: Option<&str>,
    sink: &dyn ErrorSink,
) -> &'a PhotoRecord {
    if let Some(title) = title_image {
        match photos.iter().find(|p| p.file_name == title) {
            Some(photo) => return photo,
            None => sink.log_error(&format!(
                "could not find titleImage ({title})... using default (first)"
            )),
        }
    }
    &photos[0]
}
