//! Pure Rust image backend.
//!
//! | Capability | Crate / function |
//! |---|---|
//! | Dimensions | `image::image_dimensions` (header only, no decode) |
//! | EXIF + TIFF tags | `kamadak-exif` |
//! | IPTC | custom IIM parser (JPEG APP13 + TIFF IFD) |
//! | Decode | `image::ImageReader` |
//! | Scale + draw | `resize_exact` (Triangle) + `imageops::overlay` |

use super::backend::{BackendError, Dimensions, Frame, ImageBackend, ImageInfo, TagDictionary};
use super::exif_reader::read_exif;
use super::iptc::read_iptc;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage};
use std::path::Path;

/// Extensions treated as photos when scanning a gallery directory.
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// Whether `path` has one of the [`PHOTO_EXTENSIONS`] (case-insensitive).
pub fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PHOTO_EXTENSIONS.iter().any(|p| e.eq_ignore_ascii_case(p)))
}

/// Backend built on the `image` crate.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

impl ImageBackend for RustBackend {
    fn inspect(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        let raw = std::fs::read(path)?;
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        let (exif, tiff) = read_exif(&raw);
        let tags = TagDictionary {
            iptc: read_iptc(&raw),
            exif,
            tiff,
        };
        Ok(ImageInfo {
            dimensions: Dimensions { width, height },
            tags,
            raw,
        })
    }

    fn draw_into(
        &self,
        canvas: &mut RgbImage,
        path: &Path,
        frame: Frame,
    ) -> Result<(), BackendError> {
        let img = load_image(path)?;
        let scaled = img
            .resize_exact(frame.width, frame.height, FilterType::Triangle)
            .to_rgb8();
        imageops::overlay(canvas, &scaled, i64::from(frame.x), i64::from(frame.y));
        Ok(())
    }
}
