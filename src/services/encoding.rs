use std::fmt;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    /// Legacy encoding guessed by chardetng (GBK, Big5, ...)
    Legacy(&'static Encoding),
    /// Nothing convincing; decoded as UTF-8 with replacement characters.
    Utf8Lossy,
}

impl fmt::Display for DetectedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectedEncoding::Utf8 => write!(f, "UTF-8"),
            DetectedEncoding::Utf8Bom => write!(f, "UTF-8 with BOM"),
            DetectedEncoding::Utf16Le => write!(f, "UTF-16 LE"),
            DetectedEncoding::Utf16Be => write!(f, "UTF-16 BE"),
            DetectedEncoding::Legacy(enc) => write!(f, "{}", enc.name()),
            DetectedEncoding::Utf8Lossy => write!(f, "UTF-8 (lossy)"),
        }
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

pub fn detect_encoding(buffer: &[u8]) -> DetectedEncoding {
    if buffer.starts_with(UTF8_BOM) {
        return DetectedEncoding::Utf8Bom;
    }
    if buffer.starts_with(UTF16_LE_BOM) {
        return DetectedEncoding::Utf16Le;
    }
    if buffer.starts_with(UTF16_BE_BOM) {
        return DetectedEncoding::Utf16Be;
    }

    if std::str::from_utf8(buffer).is_ok() {
        return DetectedEncoding::Utf8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(buffer, true);
    let (encoding, confident) = detector.guess_assess(None, true);
    if confident {
        DetectedEncoding::Legacy(encoding)
    } else {
        DetectedEncoding::Utf8Lossy
    }
}

/// Decode a whole file to a `String`. Never fails: undecodable bytes become
/// U+FFFD. A leading U+FEFF is removed whatever the encoding.
pub fn decode(buffer: &[u8]) -> (String, DetectedEncoding) {
    let detected = detect_encoding(buffer);
    let text = match detected {
        DetectedEncoding::Utf8 | DetectedEncoding::Utf8Bom => {
            String::from_utf8_lossy(buffer).into_owned()
        }
        DetectedEncoding::Utf16Le => UTF_16LE.decode(buffer).0.into_owned(),
        DetectedEncoding::Utf16Be => UTF_16BE.decode(buffer).0.into_owned(),
        DetectedEncoding::Legacy(encoding) => {
            let (text, _, had_errors) = encoding.decode(buffer);
            if had_errors {
                tracing::debug!(encoding = encoding.name(), "replacement characters while decoding");
            }
            text.into_owned()
        }
        DetectedEncoding::Utf8Lossy => String::from_utf8_lossy(buffer).into_owned(),
    };

    let text = match text.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    };
    (text, detected)
}
