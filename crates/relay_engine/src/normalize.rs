use std::borrow::Cow;
use std::sync::OnceLock;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;

use crate::LegacyEncoding;

/// One decoded output line and the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine {
    pub text: String,
    pub encoding: &'static str,
    /// True when the lossy UTF-8 fallback had to substitute bytes.
    pub lossy: bool,
}

/// Turns raw tool output into clean text.
///
/// Order: strip terminal control sequences on the raw bytes, keep the last
/// non-empty carriage-return segment, then decode with UTF-8 strict, the
/// configured legacy encoding strict, and finally UTF-8 lossy.
#[derive(Debug, Clone)]
pub struct Normalizer {
    legacy: Option<LegacySource>,
}

#[derive(Debug, Clone)]
enum LegacySource {
    Fixed(&'static Encoding),
    Detect,
}

impl Normalizer {
    pub fn new(legacy: &LegacyEncoding) -> Self {
        let legacy = match legacy {
            LegacyEncoding::None => None,
            LegacyEncoding::Detect => Some(LegacySource::Detect),
            LegacyEncoding::Label(label) => match Encoding::for_label(label.trim().as_bytes()) {
                Some(encoding) if encoding != UTF_8 => Some(LegacySource::Fixed(encoding)),
                Some(_) => None,
                None => {
                    engine_logging::engine_warn!(
                        "Unknown legacy encoding label '{label}', decoding UTF-8 only"
                    );
                    None
                }
            },
        };
        Self { legacy }
    }

    /// Never fails: undecodable bytes come back as U+FFFD.
    pub fn normalize(&self, raw: &[u8]) -> NormalizedLine {
        let stripped = strip_control(raw);
        let segment = last_segment(&stripped);

        if let Some(text) = decode_strict(segment, UTF_8) {
            return NormalizedLine {
                text,
                encoding: UTF_8.name(),
                lossy: false,
            };
        }
        if let Some(encoding) = self.legacy_for(segment) {
            if let Some(text) = decode_strict(segment, encoding) {
                return NormalizedLine {
                    text,
                    encoding: encoding.name(),
                    lossy: false,
                };
            }
        }
        NormalizedLine {
            text: String::from_utf8_lossy(segment).into_owned(),
            encoding: UTF_8.name(),
            lossy: true,
        }
    }

    fn legacy_for(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        match self.legacy.as_ref()? {
            LegacySource::Fixed(encoding) => Some(*encoding),
            LegacySource::Detect => {
                let mut detector = EncodingDetector::new();
                detector.feed(bytes, true);
                let guess = detector.guess(None, false);
                (guess != UTF_8).then_some(guess)
            }
        }
    }
}

fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

fn control_pattern() -> &'static Regex {
    static CONTROL: OnceLock<Regex> = OnceLock::new();
    CONTROL.get_or_init(|| {
        Regex::new(concat!(
            r"(?-u)",
            r"\x1b\[[0-?]*[ -/]*[@-~]",
            r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?",
            r"|\x1b[@-Z\\-_]",
            r"|[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]",
        ))
        .expect("valid control sequence regex")
    })
}

fn strip_control(raw: &[u8]) -> Cow<'_, [u8]> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    control_pattern().replace_all(raw, &b""[..])
}

fn last_segment(bytes: &[u8]) -> &[u8] {
    bytes
        .split(|b| *b == b'\r')
        .rev()
        .find(|segment| segment.iter().any(|b| !b.is_ascii_whitespace()))
        .unwrap_or(&[])
}
