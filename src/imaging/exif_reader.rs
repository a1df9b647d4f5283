//! EXIF and TIFF tag extraction via `kamadak-exif`.
//!
//! Missing or unreadable EXIF is not an error: the photo simply has no
//! camera details.

use super::backend::{ExifTags, TiffTags};
use chrono::NaiveDateTime;
use exif::{Field, In, Reader, Tag, Value};
use std::io::Cursor;

/// Read the EXIF and TIFF groups from raw file bytes.
pub fn read_exif(bytes: &[u8]) -> (ExifTags, TiffTags) {
    let Ok(exif) = Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
        return (ExifTags::default(), TiffTags::default());
    };
    let field = |tag: Tag| exif.get_field(tag, In::PRIMARY);

    let tags = ExifTags {
        date_time_digitized: field(Tag::DateTimeDigitized)
            .and_then(ascii_value)
            .and_then(|raw| normalize_datetime(&raw)),
        lens_model: field(Tag::LensModel).and_then(ascii_value),
        focal_length: field(Tag::FocalLength).and_then(|f| real_value(&f.value)),
        subject_distance: field(Tag::SubjectDistance).and_then(|f| real_value(&f.value)),
        iso: field(Tag::PhotographicSensitivity).and_then(|f| uint_value(&f.value)),
        exposure_time: field(Tag::ExposureTime).and_then(|f| real_value(&f.value)),
        f_number: field(Tag::FNumber).and_then(|f| real_value(&f.value)),
        exposure_bias: field(Tag::ExposureBiasValue).and_then(|f| real_value(&f.value)),
    };
    let tiff = TiffTags {
        model: field(Tag::Model).and_then(ascii_value),
    };
    (tags, tiff)
}

fn ascii_value(field: &Field) -> Option<String> {
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|p| String::from_utf8_lossy(p).trim_matches(['\0', ' ']).to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn uint_value(value: &Value) -> Option<u32> {
    match value {
        Value::Short(v) => v.first().map(|n| u32::from(*n)),
        Value::Long(v) => v.first().copied(),
        _ => None,
    }
}

/// First rational (signed or unsigned) as a float; zero denominators are absent.
fn real_value(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(v) => v
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| f64::from(r.num) / f64::from(r.denom)),
        Value::SRational(v) => v
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| f64::from(r.num) / f64::from(r.denom)),
        _ => uint_value(value).map(f64::from),
    }
}

const EXIF_DATETIME: &str = "%Y:%m:%d %H:%M:%S";
const EXIF_DATETIME_NO_SECONDS: &str = "%Y:%m:%d %H:%M";

/// `2024:01:15 10:30:45` → `2024-01-15T10:30:45`.
///
/// Seconds may be missing. Anything that is not a real calendar time is `None`.
pub fn normalize_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, EXIF_DATETIME)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, EXIF_DATETIME_NO_SECONDS))
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}
