//! # photosite
//!
//! A static photo gallery generator. Folders of photos become masonry walls
//! with per-photo info panels, sprite-strip thumbnails, an index page and a
//! sitemap.
//!
//! # Architecture: One Run, Two Levels of Fan-Out
//!
//! ```text
//! site::generate_site
//! ├── gallery::generate_gallery   (one per [[gallery]], in parallel)
//! │   ├── fsutil::copy_directory  copy + rename + duplicate detection
//! │   ├── metadata::Extractor     (one per photo, in parallel, cache-checked)
//! │   ├── sprite::compose         thumbnail strip + background percentages
//! │   └── render                  info fragments + gallery page
//! ├── static assets               optional stylesheet inlining
//! ├── index sprite + index page   galleries in sequence order
//! ├── sitemap.xml
//! └── cache::PhotoCache::save     records for the next run
//! ```
//!
//! Progress and errors flow into a [`status::StatusTree`]: one node per
//! gallery plus a root. Each task writes only its own node; a gallery error
//! flags the root without copying its text. Cancellation is a
//! [`cancel::CancelToken`] polled at step boundaries; a cancelled node ends
//! `Cancelled`, never errored.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`site`] | Whole run: galleries in parallel, static copy, index, sitemap, cache |
//! | [`gallery`] | One gallery: copy, extract, sort, favorite, fragments, sprite, page |
//! | [`metadata`] | `PhotoRecord` assembly, XMP crop scanning, directives, filename cleanup |
//! | [`geometry`] | Crop and rotation math for the crop preview |
//! | [`sprite`] | Thumbnail strip packing and CSS background-position search |
//! | [`cache`] | Previous-run records keyed by source path and modification time |
//! | [`status`] | Status tree, `ErrorSink`, live events and snapshots |
//! | [`cancel`] | Cooperative cancellation token |
//! | [`fsutil`] | Recursive copy with hooks, clean, count, atomic write |
//! | [`render`] | Maud templates for pages and info fragments |
//! | [`sitemap`] | `sitemap.xml` with image extensions |
//! | [`config`] | `site.toml` loading, merging over defaults, validation |
//! | [`naming`] | Output file names and generation-safe gallery names |
//! | [`imaging`] | Image capability: identify, read tags, draw scaled |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Metadata Cache Keyed by Source
//!
//! Reading EXIF, IPTC and XMP is the slow part of a rebuild. Records are
//! stored per gallery in `<output>/.photosite-cache.json` and reused while the
//! *source* photo's modification time and the crop preview settings are
//! unchanged. Copies in the output tree get fresh timestamps, so they are
//! never used as identity.
//!
//! ## Recoverable Problems Are Not Errors
//!
//! Duplicate output names, a missing title image or a photo that cannot be
//! decoded are logged on the gallery's status node and the gallery carries
//! on. Only an empty gallery fails it, and only a failing site-level step
//! (static copy, index, sitemap) is logged on the root.
//!
//! ## Sprite Strips Over Thumbnail Files
//!
//! Each wall loads one JPEG strip instead of one thumbnail per photo. The
//! percentage each brick needs for `background-position-y` has no convenient
//! inverse, so [`sprite`] finds it by bisection against the forward formula.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod fsutil;
pub mod gallery;
pub mod geometry;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod render;
pub mod site;
pub mod sitemap;
pub mod sprite;
pub mod status;

#[cfg(test)]
pub(crate) mod test_helpers;
