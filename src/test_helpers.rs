//! Shared test utilities.
//!
//! - [`RecordingSink`]: an [`ErrorSink`] that remembers everything it was told
//! - fixture builders that lay out a source tree (gallery folders with dummy
//!   photo files) in a [`TempDir`]
//! - [`tags`]: terse [`TagDictionary`] construction
//!
//! Photo files written here are placeholders; tests pair them with
//! `MockBackend`, which serves dimensions and tags by file name.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::imaging::{ExifTags, IptcData, TagDictionary, TiffTags};
use crate::status::ErrorSink;

// =========================================================================
// Recording sink
// =========================================================================

#[derive(Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    ticks: Mutex<usize>,
}

impl RecordingSink {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn ticks(&self) -> usize {
        *self.ticks.lock().unwrap()
    }
}

impl ErrorSink for RecordingSink {
    fn log_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn handle_error(&self, context: &str, error: &dyn Display) {
        self.log_error(&format!("{context}: {error}"));
    }

    fn log_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn progress_tick(&self) {
        *self.ticks.lock().unwrap() += 1;
    }
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Create `dir` (and parents) and write placeholder files named `files`.
pub fn write_files(dir: &Path, files: &[&str]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    files
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, format!("placeholder {name}")).unwrap();
            path
        })
        .collect()
}

/// A source tree with `galleries/<dir>/<files>` for each gallery given.
pub fn source_tree(galleries: &[(&str, &[&str])]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (dir, files) in galleries {
        write_files(&tmp.path().join("galleries").join(dir), files);
    }
    tmp
}

/// Read a generated file as a string. Panics with the path on failure.
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

// =========================================================================
// Tag construction
// =========================================================================

/// Tags with a caption, keywords and a camera model.
pub fn tags(caption: &str, keywords: &[&str], model: &str) -> TagDictionary {
    TagDictionary {
        iptc: IptcData {
            caption: Some(caption.to_string()),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        },
        exif: ExifTags::default(),
        tiff: TiffTags {
            model: Some(model.to_string()),
        },
    }
}

/// XMP packet carrying a rating and, optionally, crop fields.
pub fn xmp_packet(rating: u8, crop: Option<(f64, f64, f64, f64, f64)>) -> String {
    let crop_attrs = match crop {
        Some((top, left, bottom, right, angle)) => format!(
            r#"crs:HasCrop="True" crs:CropTop="{top}" crs:CropLeft="{left}" crs:CropBottom="{bottom}" crs:CropRight="{right}" crs:CropAngle="{angle}""#
        ),
        None => String::new(),
    };
    format!(
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/" xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/" xmp:Rating="{rating}" {crop_attrs}/></rdf:RDF></x:xmpmeta>"#
    )
}
