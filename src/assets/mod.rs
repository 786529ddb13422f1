//! Asset discovery and fetching.
//!
//! Every media source referenced by the pages (plus the cover) is fetched
//! exactly once and stored under `OEBPS/assets/`. Declared styles and scripts
//! land in `OEBPS/styles/` and `OEBPS/scripts/`. All fetches run concurrently
//! and the first failure aborts the whole resolution.

pub mod fetch;
pub mod sniff;
pub mod sources;

use std::collections::HashSet;

use futures::future::try_join_all;
use log::{debug, info, warn};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

pub use fetch::{DEFAULT_USER_AGENT, Fetch, Fetched, HttpFetcher};
pub use sources::Source;

use crate::book::ResolvedBook;
use crate::error::{Error, FetchError, Result};
use crate::io::Storage;
use crate::markup::Fragment;
use crate::util::{decode_text, extract_declared_encoding, short_digest};

/// Directory of the package content inside the container.
pub const CONTENT_DIR: &str = "OEBPS";

/// Manifest id reserved for the cover image.
pub const COVER_ID: &str = "cover-image";

/// Characters escaped when an href is used as a URL.
const HREF_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What an asset is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Image, audio or video referenced from a page or used as the cover.
    Media,
    Style,
    Script,
}

impl AssetKind {
    fn dir(self) -> &'static str {
        match self {
            AssetKind::Media => "assets",
            AssetKind::Style => "styles",
            AssetKind::Script => "scripts",
        }
    }
}

/// A resolved resource. Never changes once resolution is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: String,
    /// Source string exactly as it appeared in the book.
    pub source: String,
    /// Path relative to the content directory, e.g. `assets/cover.jpg`.
    pub href: String,
    pub media_type: String,
    pub kind: AssetKind,
    pub is_cover: bool,
}

impl Asset {
    /// Path of the stored file relative to the book root.
    pub fn path(&self) -> String {
        format!("{CONTENT_DIR}/{}", self.href)
    }

    /// The href as a relative URL, for use in markup and the manifest.
    pub fn url(&self) -> String {
        utf8_percent_encode(&self.href, HREF_ESCAPES).to_string()
    }

    pub fn properties(&self) -> Option<&'static str> {
        self.is_cover.then_some("cover-image")
    }
}

/// Output of the asset stage.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAssets {
    /// Media in manifest order: video, audio, then images.
    pub media: Vec<Asset>,
    /// Styles in declared order.
    pub styles: Vec<Asset>,
    /// Scripts in declared order.
    pub scripts: Vec<Asset>,
    /// Page bodies as markup, with `file://` pages loaded.
    pub page_bodies: Vec<String>,
}

impl ResolvedAssets {
    /// Media, styles and scripts, in manifest order.
    pub fn all(&self) -> impl Iterator<Item = &Asset> {
        self.media
            .iter()
            .chain(self.styles.iter())
            .chain(self.scripts.iter())
    }

    /// The media asset fetched for `source`.
    pub fn by_source(&self, source: &str) -> Option<&Asset> {
        self.media.iter().find(|asset| asset.source == source)
    }

    pub fn cover(&self) -> Option<&Asset> {
        self.media.iter().find(|asset| asset.is_cover)
    }
}

/// An asset whose location is decided but whose content is not yet fetched.
#[derive(Debug)]
struct Planned {
    id: String,
    source: String,
    href: String,
    kind: AssetKind,
    is_cover: bool,
}

/// Resolve every asset of `book`, storing the content in `storage`.
pub async fn resolve<F, S>(book: &ResolvedBook, fetcher: &F, storage: &S) -> Result<ResolvedAssets>
where
    F: Fetch,
    S: Storage,
{
    let page_bodies = try_join_all(book.pages.iter().map(|page| load_body(&page.body))).await?;

    let media_sources = collect_media_sources(&book.cover, &page_bodies)?;
    let planned = plan(&book.cover, &media_sources, &book.styles, &book.scripts);
    info!(
        "Resolving {} media, {} style and {} script assets",
        media_sources.len(),
        book.styles.len(),
        book.scripts.len()
    );

    let media_types = try_join_all(
        planned
            .iter()
            .map(|asset| materialize(asset, fetcher, storage)),
    )
    .await?;

    let mut resolved = ResolvedAssets {
        page_bodies,
        ..Default::default()
    };
    for (plan, media_type) in planned.into_iter().zip(media_types) {
        let asset = Asset {
            id: plan.id,
            source: plan.source,
            href: plan.href,
            media_type,
            kind: plan.kind,
            is_cover: plan.is_cover,
        };
        match asset.kind {
            AssetKind::Media => resolved.media.push(asset),
            AssetKind::Style => resolved.styles.push(asset),
            AssetKind::Script => resolved.scripts.push(asset),
        }
    }
    Ok(resolved)
}

/// Load a page body, reading `file://` pages from disk.
async fn load_body(body: &str) -> Result<String> {
    let Source::LocalFile(path) = Source::classify(body) else {
        return Ok(body.to_string());
    };
    let path = sources::local_path(path);
    let bytes = tokio::fs::read(path.as_ref())
        .await
        .map_err(|cause| Error::PageReadFailed {
            path: path.to_string(),
            cause,
        })?;
    debug!("Loaded page body from {path}");

    let text = decode_text(&bytes, extract_declared_encoding(&bytes));
    Ok(Fragment::parse_document(&text).to_html())
}

/// Unique media sources in manifest order.
///
/// Video sources come first, then audio sources, then images (the cover,
/// every `img[src]`, then video posters). The first occurrence wins and
/// empty sources are skipped.
pub fn collect_media_sources(cover: &str, bodies: &[String]) -> Result<Vec<String>> {
    let merged = Fragment::parse(&bodies.concat());
    let dom = merged.dom();

    let mut videos = Vec::new();
    let mut audios = Vec::new();
    let mut images = vec![cover.to_string()];
    images.extend(merged.attr_values("img[src]", "src")?);

    for (tag, out) in [("video", &mut videos), ("audio", &mut audios)] {
        for element in merged.select(tag)? {
            if tag == "video"
                && let Some(poster) = merged.attr(element, "poster")
            {
                images.push(poster.to_string());
            }
            out.extend(
                dom.descendants(element)
                    .into_iter()
                    .filter(|&id| dom.local_name(id).is_some_and(|n| &**n == "source"))
                    .filter_map(|id| merged.attr(id, "src").map(str::to_string)),
            );
            if let Some(src) = merged.attr(element, "src") {
                out.push(src.to_string());
            }
        }
    }

    let mut seen = HashSet::new();
    Ok(videos
        .into_iter()
        .chain(audios)
        .chain(images)
        .filter(|src| !src.is_empty())
        .filter(|src| seen.insert(src.clone()))
        .collect())
}

/// Assign ids and hrefs to every asset.
fn plan(cover: &str, media: &[String], styles: &[String], scripts: &[String]) -> Vec<Planned> {
    let mut taken = HashSet::new();
    let mut planned = Vec::with_capacity(media.len() + styles.len() + scripts.len());

    for (i, source) in media.iter().enumerate() {
        let is_cover = source == cover;
        let name = media_file_name(source, &mut taken);
        planned.push(Planned {
            id: if is_cover {
                COVER_ID.to_string()
            } else {
                format!("asset_{i}")
            },
            source: source.clone(),
            href: format!("{}/{name}", AssetKind::Media.dir()),
            kind: AssetKind::Media,
            is_cover,
        });
    }

    for (kind, prefix, ext, sources) in [
        (AssetKind::Style, "css", "css", styles),
        (AssetKind::Script, "js", "js", scripts),
    ] {
        for (i, source) in sources.iter().enumerate() {
            planned.push(Planned {
                id: format!("{prefix}_{i}"),
                source: source.clone(),
                href: format!("{}/{prefix}_{i}.{ext}", kind.dir()),
                kind,
                is_cover: false,
            });
        }
    }

    planned
}

/// File name under `assets/` for a media source, unique within the book.
fn media_file_name(source: &str, taken: &mut HashSet<String>) -> String {
    let digest = short_digest(source);
    let name = match Source::classify(source) {
        Source::Data(uri) => {
            let ext = sources::decode_data_uri(uri)
                .ok()
                .and_then(|data| mime_guess::get_mime_extensions_str(&data.media_type))
                .and_then(|exts| exts.first().copied());
            match ext {
                Some(ext) => format!("{digest}.{ext}"),
                None => digest.clone(),
            }
        }
        _ => sources::basename(source).unwrap_or_else(|| digest.clone()),
    };

    // Compared case-insensitively so the tree also unpacks on
    // case-insensitive filesystems.
    if taken.insert(name.to_lowercase()) {
        return name;
    }
    let prefixed = format!("{digest}-{name}");
    warn!("Asset name '{name}' is already used, storing '{source}' as '{prefixed}'");
    taken.insert(prefixed.to_lowercase());
    prefixed
}

/// Fetch one asset into storage and report its media type.
async fn materialize<F, S>(asset: &Planned, fetcher: &F, storage: &S) -> Result<String>
where
    F: Fetch,
    S: Storage,
{
    let failed = |cause: FetchError| Error::AssetFetchFailed {
        locator: asset.source.clone(),
        cause,
    };

    let (bytes, detected) = match Source::classify(&asset.source) {
        Source::LocalFile(path) => {
            let path = sources::local_path(path);
            let bytes = tokio::fs::read(path.as_ref())
                .await
                .map_err(|e| failed(e.into()))?;
            let media_type = sniff::sniff_media_type(&path, &bytes);
            (bytes, media_type)
        }
        Source::Remote(url) => {
            let fetched = fetcher.fetch(url).await.map_err(failed)?;
            let media_type = fetched
                .media_type
                .unwrap_or_else(|| sniff::sniff_media_type(url, &fetched.bytes));
            (fetched.bytes, media_type)
        }
        Source::Data(uri) => {
            let data = sources::decode_data_uri(uri).map_err(failed)?;
            (data.bytes, data.media_type)
        }
        Source::Inline(text) => {
            if asset.kind == AssetKind::Media {
                warn!("Media source '{text}' has no scheme, storing it as literal content");
            }
            let media_type = mime_guess::from_path(text)
                .first_raw()
                .unwrap_or("text/plain")
                .to_string();
            (text.as_bytes().to_vec(), media_type)
        }
    };

    let media_type = match asset.kind {
        AssetKind::Media => detected,
        AssetKind::Style => "text/css".to_string(),
        AssetKind::Script => "text/javascript".to_string(),
    };

    let path = format!("{CONTENT_DIR}/{}", asset.href);
    debug!("Storing {} ({media_type}, {} bytes)", path, bytes.len());
    storage
        .write(&path, bytes)
        .await
        .map_err(|e| failed(e.into()))?;
    Ok(media_type)
}
