//! Small shared helpers: text decoding, identifiers, escaping.

use std::borrow::Cow;

/// Get a time-based seed value for pseudo-random number generation.
pub fn time_seed_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(12345)
}

/// Generate a random (v4) UUID string.
///
/// Not cryptographically secure, only unique enough to name builds and books.
pub fn uuid_v4() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};

    // Mixed into the seed so two calls within one clock tick still differ.
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut state = time_seed_nanos() ^ COUNTER
        .fetch_add(1, Ordering::Relaxed)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut bytes = [0u8; 16];
    for byte in &mut bytes {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        *byte = (state >> 33) as u8;
    }

    // Set version (4) and variant (2)
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// First eight hex digits of the SHA-1 of `input`.
pub fn short_digest(input: &str) -> String {
    let digest = sha1_smol::Sha1::from(input).digest().to_string();
    digest[..8].to_string()
}

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (BOM aware), then the hint encoding, then Windows-1252.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding named by an XML declaration or `<meta charset>`.
///
/// Only the first 1024 bytes are inspected.
pub fn extract_declared_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(1024)];

    for needle in [&b"encoding="[..], &b"charset="[..]] {
        let Some(pos) = memchr::memmem::find(prefix, needle) else {
            continue;
        };
        let rest = &prefix[pos + needle.len()..];
        let rest = match rest.first() {
            Some(b'"') | Some(b'\'') => &rest[1..],
            Some(_) => rest,
            None => continue,
        };
        let end = rest
            .iter()
            .position(|&b| matches!(b, b'"' | b'\'' | b'>' | b';' | b' ' | b'/'))
            .unwrap_or(rest.len());
        if end > 0 {
            return std::str::from_utf8(&rest[..end]).ok();
        }
    }
    None
}

/// Escape text for XML content and attribute values.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_v4_shape() {
        let id = uuid_v4();
        assert_eq!(id.len(), 36);
        let groups: Vec<_> = id.split('-').map(str::len).collect();
        assert_eq!(groups, vec![8, 4, 4, 4, 12]);
        assert_eq!(&id[14..15], "4");
    }

    #[test]
    fn test_uuid_v4_differs_between_calls() {
        assert_ne!(uuid_v4(), uuid_v4());
    }

    #[test]
    fn test_short_digest_is_stable() {
        assert_eq!(short_digest("abc"), "a9993e36");
        assert_eq!(short_digest("abc").len(), 8);
    }

    #[test]
    fn test_decode_text_windows_1252_fallback() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_text(&bytes, None), "café");
    }

    #[test]
    fn test_extract_declared_encoding() {
        assert_eq!(
            extract_declared_encoding(br#"<?xml version="1.0" encoding="ISO-8859-1"?>"#),
            Some("ISO-8859-1")
        );
        assert_eq!(
            extract_declared_encoding(br#"<html><head><meta charset="utf-8">"#),
            Some("utf-8")
        );
        assert_eq!(extract_declared_encoding(b"<p>plain</p>"), None);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("Hello & World"), "Hello &amp; World");
        assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape_xml("\"quoted\""), "&quot;quoted&quot;");
    }
}
