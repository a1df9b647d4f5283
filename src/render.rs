//! HTML rendering sink.
//!
//! Every page and fragment the site writes is produced here with
//! [maud](https://maud.lambda.xyz/). The generation tasks compute values
//! (sort order, sprite percentages, crop geometry) and hand them over; this
//! module only decides markup.
//!
//! ## Generated documents
//!
//! - **Gallery wall** (`/<gen>.html`): one `<gallery-image>` brick per photo
//!   carrying the attributes the client-side masonry and slideshow read
//! - **Info fragment** (`/<gen>/<stem>.html`): the slideshow's metadata panel
//!   for one photo, fetched on demand
//! - **Index** (`/index.html`): one `<gallery-link>` brick per gallery
//!
//! ## Cache busting
//!
//! Scripts, stylesheets and sprite URLs carry `?tsid=<GenerationId>` so a new
//! build invalidates browser caches.

use crate::gallery::GeneratedGallery;
use crate::metadata::PhotoRecord;
use crate::sprite::SpriteSlot;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fmt;

/// Scripts loaded by every page, in order.
pub const JS_FILES: &[&str] = &[
    "js/webcomponents.js",
    "js/layout.js",
    "js/slides.js",
    "js/startup.js",
];

const FEET_PER_METRE: f64 = 3.28084;

/// Masonry seed grid: three columns of 200px cells.
const SEED_COLUMNS: usize = 3;
const SEED_CELL: usize = 200;

/// Per-run timestamp id (`yyyyMMddHHmmss`, local time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationId(String);

impl GenerationId {
    pub fn now() -> Self {
        Self(chrono::Local::now().format("%Y%m%d%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GenerationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn versioned(url: &str, id: &GenerationId) -> String {
    format!("{url}?tsid={id}")
}

/// Sprite URL for a gallery (or `index`), without the tsid.
pub fn sprite_url(gen_name: &str) -> String {
    format!("/thumbs/{gen_name}.jpg")
}

/// `(top, left)` seed position of brick `index` in the masonry grid.
pub fn seed_position(index: usize) -> (usize, usize) {
    (
        (index / SEED_COLUMNS) * SEED_CELL,
        (index % SEED_COLUMNS) * SEED_CELL,
    )
}

// ============================================================================
// Page shell
// ============================================================================

fn page_shell(title: &str, id: &GenerationId, preloads: &[String], content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        (PreEscaped(format!("<!-- generated: {id} -->")))
        html lang="en-US" {
            head {
                title { (title) }
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                link rel="stylesheet" href=(versioned("css/styles.css", id));
                link rel="icon" type="image/svg+xml" href=(versioned("/images/favicon.svg", id));
                link rel="manifest" href=(versioned("/manifest.webmanifest", id));
                @for preload in preloads {
                    link rel="preload" as="image" href=(versioned(preload, id));
                }
            }
            body {
                header {
                    site-logo {}
                    button #menuIcon popovertarget="menu" {}
                }
                main { (content) }
                @for js in JS_FILES {
                    script src=(versioned(js, id)) {}
                }
            }
        }
    }
}

// ============================================================================
// Info fragment
// ============================================================================

fn stars(rating: u8) -> PreEscaped<String> {
    let filled = usize::from(rating.min(5));
    PreEscaped(format!(
        "{}{}",
        "&starf;".repeat(filled),
        "&star;".repeat(5 - filled)
    ))
}

/// `1/250 sec` below one second, `2 sec` otherwise. `None` unless the time
/// is positive and finite.
pub fn format_exposure(seconds: f64) -> Option<String> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return None;
    }
    Some(if seconds < 1.0 {
        format!("1/{:.0} sec", 1.0 / seconds)
    } else {
        format!("{seconds} sec")
    })
}

/// `39.4 ft (12.0 m)`.
pub fn format_distance(metres: f64) -> String {
    format!("{:.1} ft ({:.1} m)", metres * FEET_PER_METRE, metres)
}

/// `+0.7 EV`, `-1.0 EV`.
pub fn format_compensation(ev: f64) -> String {
    format!("{ev:+.1} EV")
}

/// Slideshow metadata panel for one photo.
pub fn info_fragment(photo: &PhotoRecord) -> Markup {
    let crop_json = photo
        .crop
        .as_ref()
        .and_then(|crop| serde_json::to_string(crop).ok());

    html! {
        div class="info hide" {
            @if let Some(caption) = &photo.caption {
                div.caption { (caption) }
            }
            @if let Some(time) = &photo.capture_time {
                div.creationDate { (time) }
            }
            @if let Some(copyright) = &photo.copyright {
                div.copyright { (copyright) }
            }
            div.rating { (stars(photo.rating)) }
            @if let Some(camera) = &photo.camera {
                div.camera { (camera) }
            }
            @if let Some(lens) = &photo.lens {
                div.lens { (lens) }
            }
            @if let Some(focal) = photo.focal_length {
                div.focalLength { (format!("{focal:.0}mm")) }
            }
            @if let Some(distance) = photo.subject_distance {
                div.focalDistance { (format_distance(distance)) }
            }
            @if let Some(iso) = photo.iso {
                div.iso { "ISO " (iso) }
            }
            @if let Some(aperture) = photo.aperture {
                div.fstop { (PreEscaped("&fnof;")) (aperture) }
            }
            @if let Some(exposure) = photo.exposure_time.and_then(format_exposure) {
                div.exposure { (exposure) }
            }
            @if let Some(ev) = photo.exposure_compensation {
                div.exposureComp { (format_compensation(ev)) }
            }
            @if !photo.keywords.is_empty() {
                div.keywords {
                    @for keyword in &photo.keywords {
                        div { (keyword) }
                    }
                }
            }
            @if let Some(json) = crop_json {
                div.crop {
                    "Crop:"
                    canvas #cropCanvas data-crop=(json) {}
                }
            }
            @if let Some(source) = &photo.source_name {
                div.source { "Source: " (source) }
            }
        }
    }
}

// ============================================================================
// Gallery wall
// ============================================================================

/// Everything the gallery wall needs.
pub struct GalleryPage<'a> {
    pub id: &'a GenerationId,
    pub gen_name: &'a str,
    pub title: &'a str,
    /// Display order.
    pub photos: &'a [PhotoRecord],
    /// One sprite slot per photo, same order.
    pub slots: &'a [SpriteSlot],
}

pub fn gallery_page(page: &GalleryPage) -> Markup {
    let sprite = sprite_url(page.gen_name);
    let thumbsrc = versioned(&sprite, page.id);
    let mut preloads = vec![sprite];
    if let Some(first) = page.photos.first() {
        preloads.push(format!("/{}/{}", page.gen_name, first.file_name));
    }

    let content = html! {
        (page.title)
        br;
        div #slideShow.slideShowHidden {
            fade-in-image #current explicitSizing="true" thumbsrc=(thumbsrc) {}
            div.ssControls {
                button onclick="window.slideShow.hide()" { "X" }
                div #gotoPrev { div #prevIcon {} }
                div #gotoNext { div #nextIcon {} }
            }
            img #prev src="" alt="prev";
            img #next src="" alt="next";
        }
        div #gallery.wall data-gallery-name=(page.gen_name) thumbsrc=(thumbsrc) {
            @for (index, (photo, slot)) in page.photos.iter().zip(page.slots).enumerate() {
                @let (top, left) = seed_position(index);
                gallery-image.brick
                    imagesrc=(photo.file_name)
                    caption=[photo.caption.as_deref()]
                    ar=(photo.aspect_ratio)
                    top=(top)
                    left=(left)
                    thumbPct=(slot.css_percent())
                    stars=(photo.rating)
                    tm=[photo.capture_time.as_deref()] {}
            }
        }
    };

    page_shell(page.title, page.id, &preloads, content)
}

// ============================================================================
// Index
// ============================================================================

/// Site index: one link brick per gallery, galleries in display order.
pub fn index_page(id: &GenerationId, galleries: &[GeneratedGallery], slots: &[SpriteSlot]) -> Markup {
    let content = html! {
        div #galleries.wall data-thumbsrc=(versioned(&sprite_url("index"), id)) {
            @for (index, (gallery, slot)) in galleries.iter().zip(slots).enumerate() {
                @let (top, left) = seed_position(index);
                gallery-link.brick
                    linkTxt=(gallery.title)
                    gallery=(gallery.name)
                    categories=(gallery.categories.join("|"))
                    imagesrc=(gallery.favorite.file_name)
                    ar=(gallery.favorite.aspect_ratio)
                    top=(top)
                    left=(left)
                    thumbPct=(slot.css_percent()) {}
            }
        }
    };
    page_shell("Galleries", id, &[sprite_url("index")], content)
}
