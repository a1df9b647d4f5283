//! Image capability: identify, read tags, draw scaled into a raster.
//!
//! | Capability | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **EXIF / TIFF** | `kamadak-exif` |
//! | **IPTC** | custom parser (JPEG APP13 + TIFF IFD) |
//! | **Draw** | `resize_exact` + `imageops::overlay` |
//!
//! The module is split into:
//! - **Backend**: [`ImageBackend`] trait, tag dictionary types, test mock
//! - **RustBackend**: the production implementation
//! - **Parsers**: IPTC-IIM and EXIF readers working on raw bytes

pub mod backend;
mod exif_reader;
pub(crate) mod iptc;
pub mod rust_backend;

pub use backend::{
    BackendError, Dimensions, ExifTags, Frame, ImageBackend, ImageInfo, TagDictionary, TiffTags,
};
pub use iptc::IptcData;
pub use rust_backend::{RustBackend, is_photo};
