//! IPTC-IIM reader for JPEG and TIFF byte buffers.
//!
//! Reads four Record 2 datasets:
//! - ObjectName (2:05)
//! - Keywords (2:25), repeatable
//! - CopyrightNotice (2:116)
//! - Caption-Abstract (2:120)
//!
//! JPEG carries IIM inside an APP13 segment as Photoshop resource `0x0404`.
//! TIFF carries it in IFD tag 33723 (raw IIM) or inside the Photoshop
//! resource block of tag 34377. The container is recognised by its magic
//! bytes, not the file extension.

/// IPTC fields extracted from an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcData {
    pub object_name: Option<String>,
    pub caption: Option<String>,
    pub copyright: Option<String>,
    pub keywords: Vec<String>,
}

impl IptcData {
    fn is_empty(&self) -> bool {
        self.object_name.is_none()
            && self.caption.is_none()
            && self.copyright.is_none()
            && self.keywords.is_empty()
    }
}

const IIM_MARKER: u8 = 0x1C;
const APPLICATION_RECORD: u8 = 2;
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const TIFF_TAG_IPTC: u16 = 33723;
const TIFF_TAG_PHOTOSHOP: u16 = 34377;

/// Read IPTC from an in-memory image. Unknown containers yield empty data.
pub fn read_iptc(bytes: &[u8]) -> IptcData {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        jpeg_iim(bytes).map(parse_iim).unwrap_or_default()
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        tiff_iptc(bytes).unwrap_or_default()
    } else {
        IptcData::default()
    }
}

// ---------------------------------------------------------------------------
// IIM datasets
// ---------------------------------------------------------------------------

/// Each dataset: `0x1C`, record, dataset, u16 BE length, payload.
fn parse_iim(data: &[u8]) -> IptcData {
    let mut result = IptcData::default();
    let mut pos = 0;

    while pos + 5 <= data.len() {
        if data[pos] != IIM_MARKER {
            pos += 1;
            continue;
        }
        let record = data[pos + 1];
        let dataset = data[pos + 2];
        let len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        let start = pos + 5;
        let Some(payload) = data.get(start..start + len) else {
            break;
        };
        pos = start + len;

        if record != APPLICATION_RECORD {
            continue;
        }
        let value = String::from_utf8_lossy(payload).trim().to_string();
        if value.is_empty() {
            continue;
        }
        match dataset {
            5 => result.object_name = Some(value),
            25 => result.keywords.push(value),
            116 => result.copyright = Some(value),
            120 => result.caption = Some(value),
            _ => {}
        }
    }

    result
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

/// Walk JPEG marker segments up to start-of-scan looking for APP13 IIM.
fn jpeg_iim(data: &[u8]) -> Option<&[u8]> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            0xD8 | 0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let segment = data.get(pos + 4..pos + 2 + len)?;
        if marker == 0xED
            && let Some(iim) = photoshop_iim(segment)
        {
            return Some(iim);
        }
        pos += 2 + len;
    }
    None
}

/// Find resource `0x0404` in a Photoshop image resource block.
///
/// Resource layout: `8BIM`, u16 id, even-padded Pascal name, u32 size,
/// even-padded data.
fn photoshop_iim(block: &[u8]) -> Option<&[u8]> {
    let mut data = block.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(block);

    while data.len() >= 12 {
        if !data.starts_with(RESOURCE_SIGNATURE) {
            data = &data[1..];
            continue;
        }
        let id = u16::from_be_bytes([data[4], data[5]]);
        let name_len = data[6] as usize;
        let name_total = (1 + name_len + 1) & !1;
        let size_at = 6 + name_total;
        let size_bytes = data.get(size_at..size_at + 4)?;
        let size = u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]])
            as usize;
        let body_at = size_at + 4;
        let body = data.get(body_at..body_at + size)?;
        if id == IPTC_RESOURCE_ID {
            return Some(body);
        }
        data = data.get(body_at + ((size + 1) & !1)..)?;
    }
    None
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl TiffReader<'_> {
    fn u16_at(&self, at: usize) -> Option<u16> {
        let b = self.data.get(at..at + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, at: usize) -> Option<u32> {
        let b = self.data.get(at..at + 4)?;
        let arr = [b[0], b[1], b[2], b[3]];
        Some(if self.big_endian {
            u32::from_be_bytes(arr)
        } else {
            u32::from_le_bytes(arr)
        })
    }
}

fn tiff_type_size(field_type: u16) -> usize {
    match field_type {
        3 | 8 => 2,
        4 | 9 | 11 => 4,
        5 | 10 | 12 => 8,
        _ => 1,
    }
}

/// Walk the IFD chain for IPTC (tag 33723) or Photoshop resources (34377).
fn tiff_iptc(data: &[u8]) -> Option<IptcData> {
    let reader = TiffReader {
        data,
        big_endian: data.starts_with(b"MM"),
    };
    let mut ifd = reader.u32_at(4)? as usize;
    let mut visited = 0;

    while ifd != 0 && visited < 16 {
        visited += 1;
        let count = reader.u16_at(ifd)? as usize;
        for i in 0..count {
            let entry = ifd + 2 + i * 12;
            let tag = reader.u16_at(entry)?;
            if tag != TIFF_TAG_IPTC && tag != TIFF_TAG_PHOTOSHOP {
                continue;
            }
            let len = reader.u32_at(entry + 4)? as usize * tiff_type_size(reader.u16_at(entry + 2)?);
            let offset = reader.u32_at(entry + 8)? as usize;
            let Some(payload) = data.get(offset..offset + len) else {
                continue;
            };
            let iim = if tag == TIFF_TAG_IPTC {
                Some(payload)
            } else {
                photoshop_iim(payload)
            };
            if let Some(parsed) = iim.map(parse_iim)
                && !parsed.is_empty()
            {
                return Some(parsed);
            }
        }
        ifd = reader.u32_at(ifd + 2 + count * 12)? as usize;
    }
    None
}
