//! Whole-site generation.
//!
//! [`generate_site`] runs every configured gallery in parallel, then builds
//! the pieces that span galleries:
//!
//! ```text
//! <dest>/
//! ├── index.html               # one link per gallery, display order
//! ├── thumbs/index.jpg         # sprite over each gallery's favorite
//! ├── sitemap.xml              # only with root_url
//! ├── .photosite-cache.json    # records for the next run
//! ├── css/ js/ images/ ...     # copied from the static dir
//! └── <gen>.html, <gen>/, thumbs/<gen>.jpg   # per gallery
//! ```
//!
//! A gallery that fails leaves an error on its own status node and is left
//! out of the index and sitemap. A failure in the site-level steps is
//! recorded on the root node; whatever was already written stays. When the
//! run is cancelled no site-level output is written and the root ends
//! `Cancelled`.

use crate::cache::{CacheStats, PhotoCache};
use crate::cancel::{CancelToken, Cancelled};
use crate::config::SiteConfig;
use crate::fsutil::{self, CopyHooks, FileFilter, FsError, InlineStyleSheetFilter};
use crate::gallery::{self, GalleryInfo, GeneratedGallery, GenerationContext};
use crate::imaging::{BackendError, ImageBackend};
use crate::render::{self, GenerationId};
use crate::sitemap::{Sitemap, SitemapGallery};
use crate::sprite::{self, SpriteEntry, SpriteError, SpriteSlot};
use crate::status::{ErrorSink, SiteReporter, StatusTree};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Static file passed through the stylesheet inliner when enabled.
pub const WEBCOMPONENTS_JS: &str = "webcomponents.js";

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Copy failed: {0}")]
    Fs(#[from] FsError),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Sprite generation failed: {0}")]
    Sprite(#[from] SpriteError),
}

/// Everything one run needs besides the status tree and prior cache.
pub struct SiteRun<'a> {
    pub config: &'a SiteConfig,
    /// Folder holding `site.toml`, the galleries dir and the static dir.
    pub source: &'a Path,
    pub destination: &'a Path,
    pub backend: &'a dyn ImageBackend,
    pub id: &'a GenerationId,
    pub cancel: &'a CancelToken,
}

/// Result of a run that was not cancelled.
#[derive(Debug)]
pub struct SiteReport {
    /// Galleries that generated, in display order.
    pub galleries: Vec<GeneratedGallery>,
    pub stats: CacheStats,
}

/// Status tree with one node per configured gallery.
pub fn status_tree(config: &SiteConfig) -> StatusTree {
    StatusTree::new(
        config
            .galleries
            .iter()
            .map(|g| (g.gen_name(), g.title.clone())),
    )
}

/// Configured galleries in display order, each with its previous records.
pub fn gallery_infos(config: &SiteConfig, prior: &PhotoCache) -> Vec<GalleryInfo> {
    config
        .galleries
        .iter()
        .enumerate()
        .map(|(sequence, g)| {
            let name = g.gen_name();
            GalleryInfo {
                prior: prior.gallery(&name),
                name,
                sequence,
                title: g.title.clone(),
                directory: g.directory.clone(),
                categories: g.categories.clone(),
                title_image: g.title_image.clone(),
            }
        })
        .collect()
}

/// Generate the whole site. See the [module docs](self).
///
/// `tree` must come from [`status_tree`] for the same config. Returns
/// `Err(Cancelled)` when the run was cancelled; every other failure is
/// recorded in `tree` and the run completes.
pub fn generate_site(
    run: &SiteRun,
    prior: &PhotoCache,
    tree: &StatusTree,
) -> Result<SiteReport, Cancelled> {
    let site = tree.site();
    site.start();
    tracing::info!(id = %run.id, galleries = run.config.galleries.len(), "starting run");

    if run.config.clean_build
        && let Err(e) = fsutil::delete_contents(run.destination)
    {
        site.handle_error("cleaning destination", &e);
    }

    let infos = gallery_infos(run.config, prior);
    let galleries = run_galleries(run, &infos, tree);
    if run.cancel.is_cancelled() {
        tracing::info!("run cancelled");
        site.cancelled();
        return Err(Cancelled);
    }

    if let Err(e) = finish_site(run, &galleries, &site) {
        site.run_failed(&e);
    }
    if let Err(e) = next_cache(&infos, &galleries).save(run.destination) {
        site.handle_error("saving photo cache", &e);
    }

    let mut stats = CacheStats::default();
    for g in &galleries {
        stats.add(g.stats);
    }
    site.log_message(&format!(
        "{} of {} galleries generated ({stats})",
        galleries.len(),
        run.config.galleries.len()
    ));
    site.complete();

    Ok(SiteReport { galleries, stats })
}

/// Successful galleries sorted by sequence, whatever order they finished in.
fn run_galleries(run: &SiteRun, infos: &[GalleryInfo], tree: &StatusTree) -> Vec<GeneratedGallery> {
    let galleries_root = run.source.join(&run.config.galleries_dir);
    let ctx = GenerationContext {
        id: run.id,
        galleries_root: &galleries_root,
        destination: run.destination,
        backend: run.backend,
        thumbnails: &run.config.thumbnails,
        crop_canvas: run.config.crop.canvas,
        cancel: run.cancel,
    };

    let mut generated: Vec<GeneratedGallery> = infos
        .par_iter()
        .filter_map(|info| {
            let Some(reporter) = tree.gallery(&info.name) else {
                tracing::warn!(gallery = %info.name, "no status node, skipping");
                return None;
            };
            gallery::generate_gallery(info, &ctx, reporter).ok()
        })
        .collect();
    generated.sort_by_key(|g| g.sequence);
    generated
}

fn finish_site(
    run: &SiteRun,
    galleries: &[GeneratedGallery],
    site: &SiteReporter,
) -> Result<(), SiteError> {
    copy_static(run, site)?;

    let slots = index_sprite(run, galleries, site)?;
    let index = render::index_page(run.id, galleries, &slots);
    fsutil::write_atomic(
        &run.destination.join("index.html"),
        index.into_string().as_bytes(),
    )?;

    if let Some(root_url) = &run.config.root_url {
        let sitemap = Sitemap::new(
            root_url,
            galleries
                .iter()
                .map(|g| SitemapGallery {
                    gen_name: g.name.clone(),
                    images: g.photos.iter().map(|p| p.file_name.clone()).collect(),
                })
                .collect(),
        );
        fsutil::write_atomic(
            &run.destination.join("sitemap.xml"),
            sitemap.to_xml().as_bytes(),
        )?;
    }
    Ok(())
}

/// Copy the static dir, if there is one, into the destination root.
fn copy_static(run: &SiteRun, site: &SiteReporter) -> Result<(), SiteError> {
    let static_root = run.source.join(&run.config.static_dir);
    if !static_root.is_dir() {
        tracing::debug!(path = %static_root.display(), "no static dir");
        return Ok(());
    }

    let inliner = InlineStyleSheetFilter {
        static_root: static_root.clone(),
    };
    let filters: Vec<(&str, &dyn FileFilter)> = if run.config.inline_webcomponent_css {
        vec![(WEBCOMPONENTS_JS, &inliner as &dyn FileFilter)]
    } else {
        Vec::new()
    };
    let hooks = CopyHooks {
        filters: &filters,
        ..CopyHooks::default()
    };
    // Site-level steps are not cancellable once started.
    let never = CancelToken::new();
    fsutil::copy_directory(
        &static_root,
        run.destination,
        hooks,
        site,
        "Copying static files",
        &never,
    )?;
    Ok(())
}

/// Sprite over every gallery's favorite, written as `thumbs/index.jpg`.
fn index_sprite(
    run: &SiteRun,
    galleries: &[GeneratedGallery],
    site: &SiteReporter,
) -> Result<Vec<SpriteSlot>, SiteError> {
    if galleries.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<SpriteEntry> = galleries
        .iter()
        .map(|g| SpriteEntry {
            source: favorite_source(run.destination, g),
            aspect_ratio: g.favorite.aspect_ratio,
        })
        .collect();
    let strip = sprite::compose(run.backend, &entries, run.config.thumbnails.index_width, site)?;
    let jpeg = sprite::encode_jpeg(&strip.image, run.config.thumbnails.quality)?;
    fsutil::write_atomic(&run.destination.join("thumbs").join("index.jpg"), &jpeg)?;
    Ok(strip.layout.slots)
}

fn favorite_source(destination: &Path, gallery: &GeneratedGallery) -> PathBuf {
    gallery::thumbnail_source(&destination.join(&gallery.name), &gallery.favorite.file_name)
}

/// Cache for the next run: this run's records for galleries that
/// generated, the previous records for configured galleries that did not.
fn next_cache(infos: &[GalleryInfo], galleries: &[GeneratedGallery]) -> PhotoCache {
    let mut cache = PhotoCache::empty();
    for info in infos {
        match galleries.iter().find(|g| g.name == info.name) {
            Some(g) => cache.replace_gallery(&g.name, g.cache.clone()),
            None if !info.prior.is_empty() => {
                cache.galleries.insert(info.name.clone(), info.prior.clone());
            }
            None => {}
        }
    }
    cache
}
