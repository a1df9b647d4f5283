//! Per-photo metadata extraction.
//!
//! A [`PhotoRecord`] is assembled from three sources:
//!
//! | Source | Fields |
//! |---|---|
//! | Image header | width, height, aspect ratio |
//! | Tag dictionary (IPTC / EXIF / TIFF) | caption, copyright, keywords, capture time, lens, exposure, camera |
//! | XMP packets in the raw bytes | star rating, crop edges + angle, preserved / raw source filename |
//!
//! ## Keywords and directives
//!
//! Keywords starting with `#` are not shown as tags. They are directives to
//! the generator; the only ones understood today are orientation hints
//! (`#rotate90`, `#rotate180`, `#rotate270`).
//!
//! ## XMP
//!
//! A file may carry several `<x:xmpmeta>` packets (Lightroom writes one, some
//! export plugins add another). Each packet is parsed with `roxmltree` and
//! every `rdf:Description` is inspected; the first packet that supplies a
//! crop, a filename or a rating wins that field.
//!
//! ## Source filename cleanup
//!
//! The preserved or raw filename is shown as "Source: ..." in the info panel.
//! Extensions and tool suffixes (`-Edit`, `-Enhanced-NR`, `_DxO`, date
//! stamps, ...) are stripped repeatedly until nothing more matches, so
//! cleaning a cleaned name is a no-op.

use crate::geometry::{CropEdges, CropRenderInfo, CropRequest, Orientation, crop_render_info};
use crate::imaging::{BackendError, ImageBackend, ImageInfo};
use crate::status::ErrorSink;
use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const CRS_NS: &str = "http://ns.adobe.com/camera-raw-settings/1.0/";
const XMP_NS: &str = "http://ns.adobe.com/xap/1.0/";
const XMP_MM_NS: &str = "http://ns.adobe.com/xap/1.0/mm/";

static XMP_PACKET: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r"(?s)<x:xmpmeta.*?</x:xmpmeta>").expect("XMP packet pattern is valid")
});

static SOURCE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpe?g|tiff?|png|webp|heic|dng|cr2|cr3|nef|arw|raf|orf|rw2|psd)$")
        .expect("extension pattern is valid")
});

static SOURCE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[-_ ](edit|enhanced|nr|dxo|pureraw|photolab|hdr|pano|denoise|sharpen|topaz|\d{6,8})$",
    )
    .expect("suffix pattern is valid")
});

/// Everything the site knows about one photo.
///
/// Immutable once built; persisted in the cache between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Source file; cache identity together with `modified`.
    pub path: PathBuf,
    pub modified: SystemTime,
    /// Output file name after [`filtered_file_name`](crate::naming::filtered_file_name).
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    /// `width / height`, always positive.
    pub aspect_ratio: f64,
    /// 0 to 5 stars.
    pub rating: u8,
    /// `YYYY-MM-DDTHH:MM:SS`, sorts as a string.
    pub capture_time: Option<String>,
    pub caption: Option<String>,
    pub copyright: Option<String>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    /// Metres.
    pub subject_distance: Option<f64>,
    pub iso: Option<u32>,
    /// Seconds.
    pub exposure_time: Option<f64>,
    pub aperture: Option<f64>,
    /// EV.
    pub exposure_compensation: Option<f64>,
    pub keywords: Vec<String>,
    pub directives: Vec<String>,
    pub crop: Option<CropRenderInfo>,
    /// Cleaned preserved/raw filename, shown as the photo's source.
    pub source_name: Option<String>,
}

impl PhotoRecord {
    /// Display rotation requested by a `#rotateN` directive.
    pub fn orientation(&self) -> Orientation {
        orientation_from_directives(&self.directives)
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

/// Split `#`-prefixed directives out of a keyword list.
pub fn split_directives(all: &[String]) -> (Vec<String>, Vec<String>) {
    all.iter().cloned().partition(|k| !k.starts_with('#'))
}

pub fn orientation_from_directives(directives: &[String]) -> Orientation {
    directives
        .iter()
        .filter_map(|d| d.strip_prefix("#rotate"))
        .filter_map(|deg| deg.parse::<u32>().ok())
        .find_map(Orientation::from_degrees)
        .unwrap_or_default()
}

// ============================================================================
// XMP
// ============================================================================

/// Fields read from XMP packets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmpFields {
    pub has_crop: bool,
    pub crop_top: Option<f64>,
    pub crop_left: Option<f64>,
    pub crop_bottom: Option<f64>,
    pub crop_right: Option<f64>,
    pub crop_angle: Option<f64>,
    pub preserved_file_name: Option<String>,
    pub raw_file_name: Option<String>,
    pub rating: Option<u8>,
}

impl XmpFields {
    /// Crop edges when the crop flag is set and all four edges are usable.
    pub fn crop_edges(&self) -> Option<CropEdges> {
        if !self.has_crop {
            return None;
        }
        let edges = CropEdges {
            top: self.crop_top?,
            right: self.crop_right?,
            bottom: self.crop_bottom?,
            left: self.crop_left?,
        };
        (edges.right > edges.left && edges.bottom > edges.top).then_some(edges)
    }
}

/// Attribute form (`crs:CropTop="0.1"`) or element form
/// (`<crs:CropTop>0.1</crs:CropTop>`).
fn property(node: Node, ns: &str, name: &str) -> Option<String> {
    node.attribute((ns, name))
        .map(str::to_string)
        .or_else(|| {
            node.children()
                .find(|c| c.has_tag_name((ns, name)))
                .and_then(|c| c.text())
                .map(|t| t.trim().to_string())
        })
        .filter(|v| !v.is_empty())
}

fn number(node: Node, ns: &str, name: &str) -> Option<f64> {
    property(node, ns, name).and_then(|v| v.parse().ok())
}

/// A crop is claimed only by a description whose four edges all parse, so a
/// flagged but incomplete crop does not hide a later complete one.
fn apply_description(fields: &mut XmpFields, node: Node) {
    if !fields.has_crop
        && let Some(flag) = property(node, CRS_NS, "HasCrop")
        && flag.eq_ignore_ascii_case("true")
        && let (Some(top), Some(left), Some(bottom), Some(right)) = (
            number(node, CRS_NS, "CropTop"),
            number(node, CRS_NS, "CropLeft"),
            number(node, CRS_NS, "CropBottom"),
            number(node, CRS_NS, "CropRight"),
        )
    {
        fields.has_crop = true;
        fields.crop_top = Some(top);
        fields.crop_left = Some(left);
        fields.crop_bottom = Some(bottom);
        fields.crop_right = Some(right);
        fields.crop_angle = number(node, CRS_NS, "CropAngle");
    }
    if fields.preserved_file_name.is_none() {
        fields.preserved_file_name = property(node, XMP_MM_NS, "PreservedFileName");
    }
    if fields.raw_file_name.is_none() {
        fields.raw_file_name = property(node, CRS_NS, "RawFileName");
    }
    if fields.rating.is_none() {
        fields.rating = number(node, XMP_NS, "Rating").map(|r| r.clamp(0.0, 5.0) as u8);
    }
}

/// Scan raw file bytes for XMP packets and collect the fields we use.
pub fn scan_xmp(raw: &[u8]) -> XmpFields {
    let mut fields = XmpFields::default();
    for packet in XMP_PACKET.find_iter(raw) {
        let text = String::from_utf8_lossy(packet.as_bytes());
        let doc = match Document::parse(&text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("skipping unparsable XMP packet: {e}");
                continue;
            }
        };
        for description in doc
            .descendants()
            .filter(|n| n.has_tag_name((RDF_NS, "Description")))
        {
            apply_description(&mut fields, description);
        }
    }
    fields
}

// ============================================================================
// Source filename cleanup
// ============================================================================

/// Strip extensions and tool suffixes until a fixpoint is reached.
pub fn clean_source_filename(name: &str) -> String {
    let mut current = name.trim().to_string();
    loop {
        let next = SOURCE_EXTENSION.replace(&current, "");
        let next = SOURCE_SUFFIX.replace(&next, "").trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// One photo to extract.
#[derive(Debug, Clone)]
pub struct PhotoSource {
    pub path: PathBuf,
    pub modified: SystemTime,
    /// Output file name.
    pub file_name: String,
    /// Site-relative image used by the crop preview.
    pub preview_src: String,
}

/// Reads photos through an [`ImageBackend`] and assembles records.
pub struct Extractor<'a> {
    pub backend: &'a dyn ImageBackend,
    /// Crop preview canvas size.
    pub canvas: f64,
}

impl Extractor<'_> {
    pub fn extract(
        &self,
        photo: &PhotoSource,
        sink: &dyn ErrorSink,
    ) -> Result<PhotoRecord, BackendError> {
        let info = self.backend.inspect(&photo.path)?;
        build_record(photo, info, self.canvas, sink)
    }
}

fn build_record(
    photo: &PhotoSource,
    info: ImageInfo,
    canvas: f64,
    sink: &dyn ErrorSink,
) -> Result<PhotoRecord, BackendError> {
    let (width, height) = (info.dimensions.width, info.dimensions.height);
    if width == 0 || height == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "{} has zero-sized dimensions",
            photo.path.display()
        )));
    }

    let tags = info.tags;
    let (keywords, directives) = split_directives(&tags.iptc.keywords);
    let xmp = scan_xmp(&info.raw);

    let crop = xmp.crop_edges().map(|edges| {
        let request = CropRequest {
            image_width: width,
            image_height: height,
            edges,
            angle: xmp.crop_angle.unwrap_or(0.0),
            orientation: orientation_from_directives(&directives),
            src: photo.preview_src.clone(),
        };
        crop_render_info(&request, canvas)
    });

    let source_name = xmp
        .preserved_file_name
        .as_deref()
        .or(xmp.raw_file_name.as_deref())
        .map(|original| {
            let cleaned = clean_source_filename(original);
            if cleaned.is_empty() {
                sink.log_error(&format!(
                    "source filename '{original}' of {} is empty after cleanup",
                    photo.file_name
                ));
                original.to_string()
            } else {
                cleaned
            }
        });

    Ok(PhotoRecord {
        path: photo.path.clone(),
        modified: photo.modified,
        file_name: photo.file_name.clone(),
        width,
        height,
        aspect_ratio: f64::from(width) / f64::from(height),
        rating: xmp.rating.unwrap_or(0),
        capture_time: tags.exif.date_time_digitized,
        caption: tags.iptc.caption,
        copyright: tags.iptc.copyright,
        camera: tags.tiff.model,
        lens: tags.exif.lens_model,
        focal_length: tags.exif.focal_length,
        subject_distance: tags.exif.subject_distance,
        iso: tags.exif.iso,
        exposure_time: tags.exif.exposure_time,
        aperture: tags.exif.f_number,
        exposure_compensation: tags.exif.exposure_bias,
        keywords,
        directives,
        crop,
        source_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, info};
    use crate::imaging::{ExifTags, TagDictionary};
    use crate::test_helpers::{RecordingSink, tags, xmp_packet};

    fn source(name: &str) -> PhotoSource {
        PhotoSource {
            path: PathBuf::from("/src/peru").join(name),
            modified: SystemTime::UNIX_EPOCH,
            file_name: name.to_string(),
            preview_src: format!("peru/w0512/{name}"),
        }
    }

    fn with_raw(mut image: ImageInfo, raw: &str) -> ImageInfo {
        image.raw = format!("\u{FF}\u{D8}junk{raw}more junk").into_bytes();
        image
    }

    // =========================================================================
    // Directives
    // =========================================================================

    #[test]
    fn directives_are_split_from_keywords() {
        let all = vec!["peru".to_string(), "#rotate90".to_string(), "ruins".to_string()];
        let (keywords, directives) = split_directives(&all);
        assert_eq!(keywords, vec!["peru", "ruins"]);
        assert_eq!(directives, vec!["#rotate90"]);
    }

    #[test]
    fn rotate_directive_sets_orientation() {
        assert_eq!(
            orientation_from_directives(&["#rotate270".to_string()]),
            Orientation::Deg270
        );
        assert_eq!(
            orientation_from_directives(&["#rotate45".to_string(), "#hidden".to_string()]),
            Orientation::Deg0
        );
        assert_eq!(orientation_from_directives(&[]), Orientation::Deg0);
    }

    // =========================================================================
    // XMP scanning
    // =========================================================================

    #[test]
    fn xmp_attributes_are_read() {
        let packet = xmp_packet(4, Some((0.1, 0.05, 0.9, 0.95, 1.5)));
        let fields = scan_xmp(packet.as_bytes());
        assert_eq!(fields.rating, Some(4));
        assert!(fields.has_crop);
        assert_eq!(fields.crop_top, Some(0.1));
        assert_eq!(fields.crop_right, Some(0.95));
        assert_eq!(fields.crop_angle, Some(1.5));
        assert!(fields.crop_edges().is_some());
    }

    #[test]
    fn xmp_element_form_is_read() {
        let packet = format!(
            r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="{RDF_NS}"><rdf:Description xmlns:xmpMM="{XMP_MM_NS}" xmlns:xmp="{XMP_NS}"><xmpMM:PreservedFileName>_MG_1234.CR2</xmpMM:PreservedFileName><xmp:Rating>3</xmp:Rating></rdf:Description></rdf:RDF></x:xmpmeta>"#
        );
        let fields = scan_xmp(packet.as_bytes());
        assert_eq!(fields.preserved_file_name.as_deref(), Some("_MG_1234.CR2"));
        assert_eq!(fields.rating, Some(3));
        assert!(!fields.has_crop);
    }

    #[test]
    fn first_packet_with_crop_wins() {
        let first = xmp_packet(0, Some((0.2, 0.2, 0.8, 0.8, 0.0)));
        let second = xmp_packet(5, Some((0.0, 0.0, 1.0, 1.0, 3.0)));
        let raw = format!("{first} padding {second}");
        let fields = scan_xmp(raw.as_bytes());
        assert_eq!(fields.crop_top, Some(0.2));
        assert_eq!(fields.crop_angle, Some(0.0));
        assert_eq!(fields.rating, Some(0));
    }

    #[test]
    fn incomplete_crop_does_not_claim_the_crop() {
        let flagged = format!(
            r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="{RDF_NS}"><rdf:Description xmlns:crs="{CRS_NS}" crs:HasCrop="True" crs:CropTop="0.1" crs:CropLeft="oops"/></rdf:RDF></x:xmpmeta>"#
        );
        let complete = xmp_packet(0, Some((0.2, 0.1, 0.8, 0.9, 1.0)));
        let raw = format!("{flagged} padding {complete}");
        let fields = scan_xmp(raw.as_bytes());
        assert!(fields.has_crop);
        assert_eq!(fields.crop_top, Some(0.2));
        assert_eq!(fields.crop_left, Some(0.1));
        assert_eq!(fields.crop_angle, Some(1.0));
        assert!(fields.crop_edges().is_some());
    }

    #[test]
    fn unparsable_packet_is_skipped() {
        let raw = format!("<x:xmpmeta><broken</x:xmpmeta>{}", xmp_packet(2, None));
        assert_eq!(scan_xmp(raw.as_bytes()).rating, Some(2));
    }

    #[test]
    fn no_xmp_gives_defaults() {
        assert_eq!(scan_xmp(b"\xFF\xD8 plain jpeg"), XmpFields::default());
    }

    #[test]
    fn inverted_crop_is_ignored() {
        let fields = XmpFields {
            has_crop: true,
            crop_top: Some(0.8),
            crop_left: Some(0.1),
            crop_bottom: Some(0.2),
            crop_right: Some(0.9),
            ..Default::default()
        };
        assert_eq!(fields.crop_edges(), None);
    }

    // =========================================================================
    // Source filename cleanup
    // =========================================================================

    #[test]
    fn cleanup_strips_extension_and_suffixes() {
        assert_eq!(clean_source_filename("_MG_8665.CR2"), "_MG_8665");
        assert_eq!(clean_source_filename("IMG_0042-Enhanced-NR.dng"), "IMG_0042");
        assert_eq!(clean_source_filename("DSC01234_DxO.jpg"), "DSC01234");
        assert_eq!(clean_source_filename("P1010001-Edit-20240103.tif"), "P1010001");
    }

    #[test]
    fn cleanup_is_idempotent() {
        for name in [
            "_MG_8665.CR2",
            "IMG_0042-Enhanced-NR.dng",
            "DSC01234_DxO_PureRAW.jpg",
            "holiday.jpg.jpg",
            "Edit.jpg",
        ] {
            let once = clean_source_filename(name);
            assert_eq!(clean_source_filename(&once), once, "for {name}");
        }
    }

    #[test]
    fn cleanup_can_yield_empty() {
        assert_eq!(clean_source_filename(".jpg"), "");
    }

    // =========================================================================
    // Record assembly
    // =========================================================================

    #[test]
    fn record_from_tags() {
        let mut t = tags("Ruins at dawn", &["peru", "#rotate90"], "Canon EOS R5");
        t.iptc.copyright = Some("© Someone".into());
        t.exif = ExifTags {
            date_time_digitized: Some("2011-05-02T06:12:00".into()),
            lens_model: Some("RF24-105mm".into()),
            focal_length: Some(35.0),
            subject_distance: Some(12.5),
            iso: Some(200),
            exposure_time: Some(0.004),
            f_number: Some(8.0),
            exposure_bias: Some(-0.7),
        };
        let backend = MockBackend::new().with_info("a.jpg", info(4000, 3000, t));
        let extractor = Extractor {
            backend: &backend,
            canvas: 200.0,
        };
        let sink = RecordingSink::default();
        let record = extractor.extract(&source("a.jpg"), &sink).unwrap();

        assert_eq!(record.path, PathBuf::from("/src/peru/a.jpg"));
        assert!((record.aspect_ratio - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(record.caption.as_deref(), Some("Ruins at dawn"));
        assert_eq!(record.copyright.as_deref(), Some("© Someone"));
        assert_eq!(record.camera.as_deref(), Some("Canon EOS R5"));
        assert_eq!(record.capture_time.as_deref(), Some("2011-05-02T06:12:00"));
        assert_eq!(record.iso, Some(200));
        assert_eq!(record.aperture, Some(8.0));
        assert_eq!(record.exposure_compensation, Some(-0.7));
        assert_eq!(record.keywords, vec!["peru"]);
        assert_eq!(record.orientation(), Orientation::Deg90);
        assert_eq!(record.rating, 0);
        assert!(record.crop.is_none());
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn record_with_crop_and_source_name() {
        let packet = xmp_packet(5, Some((0.00012, 0.044335, 0.99988, 0.955665, 2.49)));
        let packet = packet.replace(
            "xmp:Rating",
            r#"crs:RawFileName="_MG_8665-Edit.CR2" xmp:Rating"#,
        );
        let image = with_raw(info(4870, 3247, TagDictionary::default()), &packet);
        let backend = MockBackend::new().with_info("b.jpg", image);
        let extractor = Extractor {
            backend: &backend,
            canvas: 200.0,
        };
        let record = extractor
            .extract(&source("b.jpg"), &RecordingSink::default())
            .unwrap();

        assert_eq!(record.rating, 5);
        assert_eq!(record.source_name.as_deref(), Some("_MG_8665"));
        let crop = record.crop.unwrap();
        assert_eq!(crop.img.src, "peru/w0512/b.jpg");
        assert_eq!(crop.img.pos.x.floor(), 8.0);
        assert_eq!(crop.img.pos.y.floor(), 39.0);
    }

    #[test]
    fn empty_cleaned_name_falls_back_and_logs() {
        let packet = xmp_packet(1, None).replace(
            "xmp:Rating",
            r#"xmlns:xmpMM="http://ns.adobe.com/xap/1.0/mm/" xmpMM:PreservedFileName=".jpg" xmp:Rating"#,
        );
        let image = with_raw(info(10, 10, TagDictionary::default()), &packet);
        let backend = MockBackend::new().with_info("c.jpg", image);
        let extractor = Extractor {
            backend: &backend,
            canvas: 200.0,
        };
        let sink = RecordingSink::default();
        let record = extractor.extract(&source("c.jpg"), &sink).unwrap();

        assert_eq!(record.source_name.as_deref(), Some(".jpg"));
        assert_eq!(sink.errors().len(), 1);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let backend =
            MockBackend::new().with_info("z.jpg", info(0, 10, TagDictionary::default()));
        let extractor = Extractor {
            backend: &backend,
            canvas: 200.0,
        };
        let result = extractor.extract(&source("z.jpg"), &RecordingSink::default());
        assert!(result.is_err());
    }

    #[test]
    fn backend_failure_propagates() {
        let backend = MockBackend::new().failing_on("bad.jpg");
        let extractor = Extractor {
            backend: &backend,
            canvas: 200.0,
        };
        assert!(extractor
            .extract(&source("bad.jpg"), &RecordingSink::default())
            .is_err());
    }

    #[test]
    fn record_stem() {
        let backend = MockBackend::new();
        let extractor = Extractor {
            backend: &backend,
            canvas: 200.0,
        };
        let record = extractor
            .extract(&source("_MG_1.jpg"), &RecordingSink::default())
            .unwrap();
        assert_eq!(record.stem(), "_MG_1");
    }
}
