//! Image capability trait and the tag dictionary it produces.
//!
//! The generation engine never touches pixels or file formats directly. It
//! asks an [`ImageBackend`] for two things:
//!
//! - **inspect**: pixel dimensions, the embedded tag groups (IPTC, EXIF,
//!   TIFF) and the raw file bytes (scanned for XMP by the extractor)
//! - **draw_into**: decode an image and draw it, scaled, into a region of a
//!   target raster
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::iptc::IptcData;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// EXIF fields the site shows in photo info panels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifTags {
    /// `DateTimeDigitized`, normalized to `YYYY-MM-DDTHH:MM:SS`.
    pub date_time_digitized: Option<String>,
    pub lens_model: Option<String>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    /// Metres.
    pub subject_distance: Option<f64>,
    pub iso: Option<u32>,
    /// Seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    /// EV.
    pub exposure_bias: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiffTags {
    pub model: Option<String>,
}

/// The embedded tag groups of one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagDictionary {
    pub iptc: IptcData,
    pub exif: ExifTags,
    pub tiff: TiffTags,
}

/// Everything the metadata extractor needs from one file.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub dimensions: Dimensions,
    pub tags: TagDictionary,
    pub raw: Vec<u8>,
}

/// Destination rectangle inside a target raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Image capability used by metadata extraction and sprite composition.
///
/// `Sync` because galleries and photos are processed on rayon workers.
pub trait ImageBackend: Sync {
    /// Read dimensions, tag groups and raw bytes.
    fn inspect(&self, path: &Path) -> Result<ImageInfo, BackendError>;

    /// Decode `path` and draw it scaled to `frame` inside `canvas`.
    fn draw_into(&self, canvas: &mut RgbImage, path: &Path, frame: Frame)
    -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that serves canned image info and paints solid frames.
    ///
    /// Info is looked up by file name; unknown files get a 300x200 landscape
    /// with no tags. `fail_on` makes `inspect` fail for one file name, and
    /// `cancel_on` trips a token when a given file is inspected.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub infos: Mutex<HashMap<String, ImageInfo>>,
        pub fail_on: Mutex<Option<String>>,
        pub cancel_on: Mutex<Option<(String, CancelToken)>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Inspect(String),
        Draw { file: String, frame: Frame },
    }

    pub fn info(width: u32, height: u32, tags: TagDictionary) -> ImageInfo {
        ImageInfo {
            dimensions: Dimensions { width, height },
            tags,
            raw: Vec::new(),
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Deterministic color for a file so drawn rows can be told apart.
    pub fn color_for(name: &str) -> image::Rgb<u8> {
        let sum: u32 = name.bytes().map(u32::from).sum();
        image::Rgb([(sum % 200) as u8 + 40, (sum * 7 % 200) as u8 + 40, 90])
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_info(self, file: &str, info: ImageInfo) -> Self {
            self.infos.lock().unwrap().insert(file.to_string(), info);
            self
        }

        pub fn failing_on(self, file: &str) -> Self {
            *self.fail_on.lock().unwrap() = Some(file.to_string());
            self
        }

        pub fn cancelling_on(self, file: &str, token: CancelToken) -> Self {
            *self.cancel_on.lock().unwrap() = Some((file.to_string(), token));
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn inspected(&self) -> Vec<String> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Inspect(f) => Some(f),
                    _ => None,
                })
                .collect()
        }
    }

    impl ImageBackend for MockBackend {
        fn inspect(&self, path: &Path) -> Result<ImageInfo, BackendError> {
            let name = file_name(path);
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Inspect(name.clone()));

            if let Some((trigger, token)) = self.cancel_on.lock().unwrap().as_ref()
                && *trigger == name
            {
                token.cancel();
            }
            if self.fail_on.lock().unwrap().as_deref() == Some(name.as_str()) {
                return Err(BackendError::ProcessingFailed(format!("cannot decode {name}")));
            }

            Ok(self
                .infos
                .lock()
                .unwrap()
                .get(&name)
                .cloned()
                .unwrap_or_else(|| info(300, 200, TagDictionary::default())))
        }

        fn draw_into(
            &self,
            canvas: &mut RgbImage,
            path: &Path,
            frame: Frame,
        ) -> Result<(), BackendError> {
            let name = file_name(path);
            self.operations.lock().unwrap().push(RecordedOp::Draw {
                file: name.clone(),
                frame,
            });
            let color = color_for(&name);
            for y in frame.y..(frame.y + frame.height).min(canvas.height()) {
                for x in frame.x..(frame.x + frame.width).min(canvas.width()) {
                    canvas.put_pixel(x, y, color);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn mock_serves_registered_info() {
        let backend = MockBackend::new().with_info("a.jpg", info(10, 20, TagDictionary::default()));
        let result = backend.inspect(Path::new("/g/a.jpg")).unwrap();
        assert_eq!(result.dimensions, Dimensions { width: 10, height: 20 });
        assert_eq!(backend.inspected(), vec!["a.jpg"]);
    }

    #[test]
    fn mock_fails_on_request() {
        let backend = MockBackend::new().failing_on("bad.jpg");
        assert!(backend.inspect(Path::new("bad.jpg")).is_err());
        assert!(backend.inspect(Path::new("good.jpg")).is_ok());
    }

    #[test]
    fn mock_trips_cancel_token() {
        let token = CancelToken::new();
        let backend = MockBackend::new().cancelling_on("stop.jpg", token.clone());
        backend.inspect(Path::new("go.jpg")).unwrap();
        assert!(!token.is_cancelled());
        backend.inspect(Path::new("stop.jpg")).unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn mock_paints_frame() {
        let backend = MockBackend::new();
        let mut canvas = RgbImage::new(4, 6);
        let frame = Frame {
            x: 0,
            y: 2,
            width: 4,
            height: 3,
        };
        backend
            .draw_into(&mut canvas, Path::new("x.jpg"), frame)
            .unwrap();
        assert_eq!(*canvas.get_pixel(1, 3), color_for("x.jpg"));
        assert_eq!(*canvas.get_pixel(1, 0), image::Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(1, 5), image::Rgb([0, 0, 0]));
    }
}
