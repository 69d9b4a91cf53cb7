//! Scalar value decoding.
//!
//! Every mode-dependent repair lives here so that lenient and strict
//! behaviour stays consistent across fields.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use flate2::read::GzDecoder;
use std::io::Read;
use uuid::Uuid;

use crate::group::TriState;
use crate::meta::Color;
use strongroom_common::{Error, ParseMode, Result};

/// Base64 decoder that tolerates missing padding and stray trailing bits.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Mode-aware parsers for the textual scalar encodings of the document.
#[derive(Debug, Clone, Copy)]
pub struct ScalarPolicy {
    mode: ParseMode,
}

impl ScalarPolicy {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// `True`/`False` in any case; empty text is false.
    pub fn parse_bool(&self, text: &str) -> Result<bool> {
        if text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if text.eq_ignore_ascii_case("false") || text.is_empty() {
            Ok(false)
        } else {
            Err(Error::Content("Invalid bool value".to_string()))
        }
    }

    /// Decimal integer.
    pub fn parse_number(&self, text: &str) -> Result<i32> {
        text.parse()
            .map_err(|_| Error::Content("Invalid number value".to_string()))
    }

    /// Base64 data. ASCII whitespace is ignored. Lenient mode also drops
    /// characters outside the alphabet and a dangling final symbol.
    pub fn parse_binary(&self, text: &str) -> Result<Vec<u8>> {
        let cleaned: String = if self.mode.is_strict() {
            text.chars().filter(|c| !c.is_ascii_whitespace()).collect()
        } else {
            let mut symbols: String = text
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/')
                .collect();
            if symbols.len() % 4 == 1 {
                symbols.pop();
            }
            symbols
        };
        FORGIVING
            .decode(cleaned)
            .map_err(|e| Error::Content(format!("Invalid base64 value: {}", e)))
    }

    /// Base64 of gzip-compressed data.
    pub fn parse_compressed_binary(&self, text: &str) -> Result<Vec<u8>> {
        let compressed = self.parse_binary(text)?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|_| Error::Content("Unable to decompress binary".to_string()))?;
        Ok(data)
    }

    /// Base64 of 16 raw bytes. The nil UUID means "absent".
    pub fn parse_uuid(&self, text: &str) -> Result<Uuid> {
        let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        match FORGIVING.decode(cleaned) {
            Ok(bytes) if bytes.is_empty() => Ok(Uuid::nil()),
            Ok(bytes) if bytes.len() == 16 => Ok(Uuid::from_slice(&bytes).unwrap_or_default()),
            _ if self.mode.is_strict() => Err(Error::Content("Invalid uuid value".to_string())),
            _ => Ok(Uuid::nil()),
        }
    }

    /// Either base64 of a little-endian signed count of seconds since
    /// 0001-01-01T00:00:00Z, or ISO-8601 text.
    pub fn parse_datetime(&self, text: &str) -> Result<DateTime<Utc>> {
        let parsed = if looks_like_base64(text) {
            FORGIVING
                .decode(text)
                .ok()
                .and_then(|bytes| from_ticks(&bytes))
        } else {
            parse_iso8601(text)
        };

        match parsed {
            Some(datetime) => Ok(datetime),
            None if self.mode.is_strict() => {
                Err(Error::Content("Invalid date time value".to_string()))
            }
            None => Ok(Utc::now()),
        }
    }

    /// `#RRGGBB`; empty text is unset.
    pub fn parse_color(&self, text: &str) -> Result<Option<Color>> {
        if text.is_empty() {
            return Ok(None);
        }

        let well_formed = text.len() == 7
            && text.starts_with('#')
            && text[1..].bytes().all(|b| b.is_ascii_hexdigit());
        if !well_formed {
            if self.mode.is_strict() {
                return Err(Error::Content("Invalid color value".to_string()));
            }
            return Ok(None);
        }

        let channel = |i: usize| u8::from_str_radix(&text[i..i + 2], 16).unwrap_or_default();
        Ok(Some(Color::new(channel(1), channel(3), channel(5))))
    }

    /// `null`/`true`/`false` in any case.
    pub fn parse_tri_state(&self, text: &str, field: &str) -> Result<TriState> {
        if text.eq_ignore_ascii_case("null") {
            Ok(TriState::Inherit)
        } else if text.eq_ignore_ascii_case("true") {
            Ok(TriState::Enable)
        } else if text.eq_ignore_ascii_case("false") {
            Ok(TriState::Disable)
        } else {
            Err(Error::Content(format!("Invalid {} value", field)))
        }
    }
}

/// Canonical, padded base64 (the empty string included).
fn looks_like_base64(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() % 4 != 0 {
        return false;
    }
    let padding = bytes.iter().rev().take_while(|&&b| b == b'=').count();
    if padding > 2 {
        return false;
    }
    bytes[..bytes.len() - padding]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
}

/// Seconds since year 1, padded or truncated to 8 bytes.
fn from_ticks(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let mut raw = [0u8; 8];
    let len = bytes.len().min(8);
    raw[..len].copy_from_slice(&bytes[..len]);
    let secs = i64::from_le_bytes(raw);

    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)?.and_utc();
    epoch.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use chrono::{Datelike, TimeZone};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use proptest::prelude::*;
    use std::io::Write;

    fn lenient() -> ScalarPolicy {
        ScalarPolicy::new(ParseMode::Lenient)
    }

    fn strict() -> ScalarPolicy {
        ScalarPolicy::new(ParseMode::Strict)
    }

    #[test]
    fn test_bool() {
        assert!(lenient().parse_bool("True").unwrap());
        assert!(lenient().parse_bool("tRUE").unwrap());
        assert!(!lenient().parse_bool("False").unwrap());
        assert!(!lenient().parse_bool("").unwrap());
        assert!(lenient().parse_bool("yes").is_err());
        assert!(strict().parse_bool("1").is_err());
    }

    #[test]
    fn test_number() {
        assert_eq!(lenient().parse_number("42").unwrap(), 42);
        assert_eq!(lenient().parse_number("-1").unwrap(), -1);
        assert!(lenient().parse_number("4x").is_err());
        assert!(lenient().parse_number("").is_err());
    }

    #[test]
    fn test_uuid() {
        let uuid = Uuid::new_v4();
        let text = STANDARD.encode(uuid.as_bytes());

        assert_eq!(strict().parse_uuid(&text).unwrap(), uuid);
        assert!(lenient().parse_uuid("").unwrap().is_nil());
        assert!(strict().parse_uuid("").unwrap().is_nil());

        let short = STANDARD.encode([1u8; 8]);
        assert!(lenient().parse_uuid(&short).unwrap().is_nil());
        assert!(matches!(strict().parse_uuid(&short), Err(Error::Content(_))));
    }

    #[test]
    fn test_datetime_ticks() {
        let expected = Utc.with_ymd_and_hms(2017, 6, 1, 12, 30, 0).unwrap();
        let epoch = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        let secs = (expected - epoch).num_seconds();
        let text = STANDARD.encode(secs.to_le_bytes());

        assert_eq!(strict().parse_datetime(&text).unwrap(), expected);
    }

    #[test]
    fn test_datetime_empty_is_year_one() {
        let parsed = strict().parse_datetime("").unwrap();
        assert_eq!(parsed.year(), 1);
    }

    #[test]
    fn test_datetime_iso8601() {
        let expected = Utc.with_ymd_and_hms(2010, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(strict().parse_datetime("2010-03-04T05:06:07Z").unwrap(), expected);
        assert_eq!(strict().parse_datetime("2010-03-04T05:06:07").unwrap(), expected);
    }

    #[test]
    fn test_datetime_invalid() {
        let before = Utc::now();
        let repaired = lenient().parse_datetime("not a date").unwrap();
        assert!(repaired >= before);

        assert!(matches!(strict().parse_datetime("not a date"), Err(Error::Content(_))));
    }

    #[test]
    fn test_color() {
        assert_eq!(strict().parse_color("#FF8000").unwrap(), Some(Color::new(255, 128, 0)));
        assert_eq!(strict().parse_color("").unwrap(), None);
        assert_eq!(lenient().parse_color("#GG0000").unwrap(), None);
        assert_eq!(lenient().parse_color("FF8000").unwrap(), None);
        assert!(strict().parse_color("#GG0000").is_err());
        assert!(strict().parse_color("#FFF").is_err());
    }

    #[test]
    fn test_tri_state() {
        assert_eq!(lenient().parse_tri_state("null", "EnableAutoType").unwrap(), TriState::Inherit);
        assert_eq!(lenient().parse_tri_state("TRUE", "EnableAutoType").unwrap(), TriState::Enable);
        assert_eq!(lenient().parse_tri_state("false", "EnableAutoType").unwrap(), TriState::Disable);

        let err = lenient().parse_tri_state("maybe", "EnableSearching").unwrap_err();
        assert_eq!(err.to_string(), "Content error: Invalid EnableSearching value");
    }

    #[test]
    fn test_binary_ignores_whitespace() {
        assert_eq!(lenient().parse_binary("aGVs\n  bG8=").unwrap(), b"hello");
        assert_eq!(lenient().parse_binary("aGVsbG8").unwrap(), b"hello");
    }

    #[test]
    fn test_binary_foreign_symbols() {
        assert_eq!(lenient().parse_binary("aG!Vs*bG8=").unwrap(), b"hello");
        assert_eq!(lenient().parse_binary("AA!A").unwrap(), vec![0, 0]);
        assert!(lenient().parse_binary("!!!").unwrap().is_empty());

        let err = strict().parse_binary("AA!A").unwrap_err();
        assert!(err.to_string().starts_with("Content error: Invalid base64 value"));
    }

    #[test]
    fn test_compressed_binary() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"attachment body").unwrap();
        let text = STANDARD.encode(encoder.finish().unwrap());

        assert_eq!(lenient().parse_compressed_binary(&text).unwrap(), b"attachment body");

        let garbage = STANDARD.encode(b"definitely not gzip");
        let err = lenient().parse_compressed_binary(&garbage).unwrap_err();
        assert_eq!(err.to_string(), "Content error: Unable to decompress binary");
    }

    proptest! {
        #[test]
        fn lenient_repairs_never_fail(text in "\\PC{0,40}") {
            let policy = lenient();
            prop_assert!(policy.parse_uuid(&text).is_ok());
            prop_assert!(policy.parse_datetime(&text).is_ok());
            prop_assert!(policy.parse_color(&text).is_ok());
            prop_assert!(policy.parse_binary(&text).is_ok());
        }
    }
}
