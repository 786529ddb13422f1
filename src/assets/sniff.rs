//! Media-type detection for local files and inline payloads.

/// Media formats recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Svg,
    Mp4,
    M4a,
    WebM,
    Ogg,
    Mp3,
    Wav,
    Ttf,
    Otf,
    Woff,
    Woff2,
    Binary,
}

impl MediaFormat {
    /// Get the MIME type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Svg => "image/svg+xml",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::M4a => "audio/mp4",
            MediaFormat::WebM => "video/webm",
            MediaFormat::Ogg => "audio/ogg",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Wav => "audio/wav",
            MediaFormat::Ttf => "font/ttf",
            MediaFormat::Otf => "font/otf",
            MediaFormat::Woff => "font/woff",
            MediaFormat::Woff2 => "font/woff2",
            MediaFormat::Binary => "application/octet-stream",
        }
    }
}

/// Detect a format from magic bytes alone.
pub fn detect_format(data: &[u8]) -> MediaFormat {
    let starts = |magic: &[u8]| data.starts_with(magic);

    if starts(&[0xFF, 0xD8, 0xFF]) {
        return MediaFormat::Jpeg;
    }
    if starts(b"\x89PNG") {
        return MediaFormat::Png;
    }
    if starts(b"GIF8") {
        return MediaFormat::Gif;
    }
    if data.len() >= 12 && starts(b"RIFF") {
        match &data[8..12] {
            b"WEBP" => return MediaFormat::WebP,
            b"WAVE" => return MediaFormat::Wav,
            _ => {}
        }
    }
    // ISO base media: size(4) "ftyp" brand(4)
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"M4A " => MediaFormat::M4a,
            _ => MediaFormat::Mp4,
        };
    }
    if starts(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return MediaFormat::WebM;
    }
    if starts(b"OggS") {
        return MediaFormat::Ogg;
    }
    if starts(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
        return MediaFormat::Mp3;
    }
    if starts(&[0x00, 0x01, 0x00, 0x00]) {
        return MediaFormat::Ttf;
    }
    if starts(b"OTTO") {
        return MediaFormat::Otf;
    }
    if starts(b"wOFF") {
        return MediaFormat::Woff;
    }
    if starts(b"wOF2") {
        return MediaFormat::Woff2;
    }

    let head = &data[..data.len().min(512)];
    if memchr::memmem::find(head, b"<svg").is_some() {
        return MediaFormat::Svg;
    }

    MediaFormat::Binary
}

/// Media type for a local file: magic bytes first, then the extension.
pub fn sniff_media_type(path: &str, data: &[u8]) -> String {
    match detect_format(data) {
        MediaFormat::Binary => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(MediaFormat::Binary.mime_type())
            .to_string(),
        format => format.mime_type().to_string(),
    }
}
