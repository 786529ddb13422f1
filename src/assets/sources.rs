//! Source locators: how a string in the book names its content.

use std::borrow::Cow;

use base64::Engine;
use percent_encoding::percent_decode_str;

use crate::error::FetchError;

/// How a source string is resolved to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source<'a> {
    /// `file://` locator; holds the path after the scheme.
    LocalFile(&'a str),
    /// `http://` or `https://` URL.
    Remote(&'a str),
    /// RFC 2397 `data:` URI.
    Data(&'a str),
    /// The string itself is the content.
    Inline(&'a str),
}

impl<'a> Source<'a> {
    pub fn classify(locator: &'a str) -> Self {
        if let Some(path) = locator.strip_prefix("file://") {
            return Source::LocalFile(path);
        }
        let scheme = locator
            .get(..8)
            .unwrap_or(locator)
            .to_ascii_lowercase();
        if scheme.starts_with("http://") || scheme.starts_with("https://") {
            Source::Remote(locator)
        } else if scheme.starts_with("data:") {
            Source::Data(locator)
        } else {
            Source::Inline(locator)
        }
    }
}

/// Filesystem path of a `file://` locator, percent-escapes decoded.
pub fn local_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path).decode_utf8_lossy()
}

/// Decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Decode `data:[<mediatype>][;base64],<data>`.
pub fn decode_data_uri(uri: &str) -> Result<DataUri, FetchError> {
    let rest = uri
        .get(5..)
        .filter(|_| uri[..5].eq_ignore_ascii_case("data:"))
        .ok_or(FetchError::InvalidDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(FetchError::InvalidDataUri)?;

    let mut params = header.split(';');
    let media_type = params
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_ascii_lowercase();
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = percent_decode_str(&compact).decode_utf8_lossy().into_owned();
        base64::engine::general_purpose::STANDARD
            .decode(decoded.as_bytes())
            .map_err(|_| FetchError::InvalidDataUri)?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(DataUri { media_type, bytes })
}

/// Last path segment of a locator, percent-decoded, without query or fragment.
///
/// Returns `None` when nothing usable as a file name remains.
pub fn basename(locator: &str) -> Option<String> {
    let path = match Source::classify(locator) {
        Source::Remote(url) => match url::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => strip_suffixes(url).to_string(),
        },
        Source::LocalFile(path) => strip_suffixes(path).to_string(),
        Source::Inline(text) => strip_suffixes(text).to_string(),
        Source::Data(_) => return None,
    };

    // Escaped separators split segments too.
    let decoded = percent_decode_str(&path).decode_utf8_lossy();
    let last = decoded.rsplit(['/', '\\']).next().unwrap_or_default();
    let name: String = last
        .chars()
        .map(|c| if c.is_control() || c == '"' { '_' } else { c })
        .collect();
    let name = name.trim();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn strip_suffixes(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}
