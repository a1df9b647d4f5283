//! Sprite strips: many thumbnails stacked into one JPEG.
//!
//! ```text
//!   y = 0   ┌────────┐  photo 0   →  background-position-y:   0%
//!           │        │
//!           ├────────┤  photo 1   →  background-position-y:  41.2%
//!           ├────────┤  photo 2   →  ...
//!           │        │
//! y = total └────────┘  photo n-1 →  background-position-y: 100%
//! ```
//!
//! Every thumbnail is scaled to the strip width, so its height is
//! `ceil(width / aspect)`. The page shows one thumbnail at a time by using the
//! strip as a CSS background. Because `background-position-y: P%` positions
//! the image by `P × (container − image)`, the percentage for a given pixel
//! offset depends on the thumbnail's height. It is found by bisection on the
//! forward formula rather than inverted in closed form.
//!
//! Offsets in the search are measured from the bottom of the strip
//! (`top = total − y`).

use crate::imaging::{Frame, ImageBackend};
use crate::status::ErrorSink;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use std::path::PathBuf;
use thiserror::Error;

/// Bisection iterations before giving up on the pixel tolerance.
const MAX_SEARCH_STEPS: usize = 100;

/// Pixel tolerance for the bisection.
const TOLERANCE_PX: f64 = 0.1;

#[derive(Error, Debug)]
pub enum SpriteError {
    #[error("sprite has no thumbnails")]
    Empty,
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// One thumbnail to place in the strip.
#[derive(Debug, Clone)]
pub struct SpriteEntry {
    /// Image drawn for this row.
    pub source: PathBuf,
    pub aspect_ratio: f64,
}

/// Where one thumbnail landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteSlot {
    /// Raster row of the thumbnail's top edge.
    pub y: u32,
    pub height: u32,
    /// `background-position-y` percentage, 0 to 100.
    pub percent: f64,
}

impl SpriteSlot {
    /// CSS value, e.g. `41.2345%`.
    pub fn css_percent(&self) -> String {
        format!("{:.4}%", self.percent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteLayout {
    pub width: u32,
    pub total_height: u32,
    pub slots: Vec<SpriteSlot>,
}

/// A composed strip ready to encode.
pub struct Sprite {
    pub image: RgbImage,
    pub layout: SpriteLayout,
}

/// Scaled thumbnail height for a strip `width` wide.
pub fn thumbnail_height(width: u32, aspect_ratio: f64) -> u32 {
    ((f64::from(width) / aspect_ratio).ceil() as u32).max(1)
}

/// Forward CSS formula: the bottom-measured offset `background-position-y:
/// percent` produces for a thumbnail of `height` in a strip of `total`.
///
/// `percent` is a fraction (0.0 to 1.0).
pub fn css_top(percent: f64, total: f64, height: f64) -> f64 {
    total - (total * percent - percent * height)
}

/// Percentage (0 to 100) that reveals the thumbnail whose top edge sits
/// `top` pixels above the bottom of a strip `total` pixels tall.
///
/// # Arguments
/// * `top` - bottom-measured offset of the thumbnail's top edge
/// * `total` - strip height
/// * `height` - thumbnail height
///
/// # Returns
/// The percentage found by bisection, within 0.1px of `top` when fed back
/// through [`css_top`].
pub fn background_position_pct(top: f64, total: f64, height: f64) -> f64 {
    let mut min = (total - top) / total;
    let mut max = (total - (top - height)) / total;
    let mut guess = (min + max) / 2.0;

    for _ in 0..MAX_SEARCH_STEPS {
        let calc = css_top(guess, total, height);
        if (calc - top).abs() < TOLERANCE_PX {
            break;
        }
        if calc < top {
            max = guess;
        } else {
            min = guess;
        }
        guess = (min + max) / 2.0;
    }

    guess * 100.0
}

/// Stack thumbnails top-down in input order and compute each percentage.
pub fn layout(aspect_ratios: &[f64], width: u32) -> SpriteLayout {
    let heights: Vec<u32> = aspect_ratios
        .iter()
        .map(|&ar| thumbnail_height(width, ar))
        .collect();
    let total_height: u32 = heights.iter().sum();
    let total = f64::from(total_height);

    let mut y = 0;
    let slots = heights
        .iter()
        .map(|&height| {
            let top = total - f64::from(y);
            let slot = SpriteSlot {
                y,
                height,
                percent: background_position_pct(top, total, f64::from(height)),
            };
            y += height;
            slot
        })
        .collect();

    SpriteLayout {
        width,
        total_height,
        slots,
    }
}

/// Draw every entry into one strip.
///
/// A thumbnail that fails to draw is reported to `sink` and leaves its row
/// blank. Each row ticks progress once.
pub fn compose(
    backend: &dyn ImageBackend,
    entries: &[SpriteEntry],
    width: u32,
    sink: &dyn ErrorSink,
) -> Result<Sprite, SpriteError> {
    if entries.is_empty() {
        return Err(SpriteError::Empty);
    }
    let ratios: Vec<f64> = entries.iter().map(|e| e.aspect_ratio).collect();
    let layout = layout(&ratios, width);
    let mut image = RgbImage::new(width, layout.total_height);

    for (entry, slot) in entries.iter().zip(&layout.slots) {
        let frame = Frame {
            x: 0,
            y: slot.y,
            width,
            height: slot.height,
        };
        if let Err(e) = backend.draw_into(&mut image, &entry.source, frame) {
            sink.handle_error(&thumbnail_context(&entry.source), &e);
        }
        sink.progress_tick();
    }

    Ok(Sprite { image, layout })
}

fn thumbnail_context(source: &std::path::Path) -> String {
    format!(
        "thumbnail {}",
        source
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    )
}

/// Encode a strip as baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, SpriteError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    image.write_with_encoder(encoder)?;
    Ok(buffer)
}
