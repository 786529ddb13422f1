//! Manifest, spine and navigation.

use futures::future::try_join_all;
use log::{debug, info};

use crate::assets::ResolvedAssets;
use crate::book::ResolvedBook;
use crate::error::{Error, Result};
use crate::io::Storage;
use crate::transform::TransformedPages;

use super::templates::{
    ContainerXml, DisplayOptions, MIMETYPE, MIMETYPE_PATH, NavDocument, NcxDocument,
    PackageDocument, Template,
};

/// One entry of the package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// 1-based position in the manifest.
    pub index: usize,
    pub id: String,
    /// URL relative to the package document.
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// One entry of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    /// 1-based position, also the NCX play order.
    pub index: usize,
    pub label: String,
    pub href: String,
}

/// Everything the package document and navigation need.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub items: Vec<ManifestItem>,
    /// Page ids in reading order.
    pub spine: Vec<String>,
    pub toc: Vec<NavEntry>,
    pub cover_id: Option<String>,
    /// Style URLs linked from the navigation document.
    pub styles: Vec<String>,
}

impl Manifest {
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Aggregate assets, pages and the two navigation documents.
///
/// Item order: media, styles, scripts, pages, `toc`, `ncx`.
pub fn build_manifest(assets: &ResolvedAssets, pages: &TransformedPages) -> Manifest {
    let mut items: Vec<ManifestItem> = Vec::new();
    let mut push = |id: &str, href: String, media_type: &str, properties: Option<&str>| {
        items.push(ManifestItem {
            index: items.len() + 1,
            id: id.to_string(),
            href,
            media_type: media_type.to_string(),
            properties: properties.map(str::to_string),
        });
    };

    for asset in assets.all() {
        push(&asset.id, asset.url(), &asset.media_type, asset.properties());
    }
    for page in &pages.pages {
        push(&page.id, page.href.clone(), page.media_type, page.properties());
    }
    push("toc", "toc.html".to_string(), "application/xhtml+xml", Some("nav"));
    push("ncx", "toc.ncx".to_string(), "application/x-dtbncx+xml", None);

    let toc = pages
        .toc_pages()
        .into_iter()
        .enumerate()
        .map(|(i, page)| NavEntry {
            index: i + 1,
            label: page.label.clone(),
            href: page.href.clone(),
        })
        .collect();

    Manifest {
        items,
        spine: pages.pages.iter().map(|page| page.id.clone()).collect(),
        toc,
        cover_id: assets.cover().map(|cover| cover.id.clone()),
        styles: assets.styles.iter().map(|style| style.url()).collect(),
    }
}

/// Render the structural documents of the package.
///
/// Returns `(path, contents)` pairs in archive order.
pub fn render_documents(book: &ResolvedBook, manifest: &Manifest) -> Vec<(&'static str, String)> {
    let language = book
        .languages
        .first()
        .map(String::as_str)
        .unwrap_or(crate::book::defaults::DEFAULT_LANGUAGE);

    let mut documents = vec![(MIMETYPE_PATH, MIMETYPE.to_string())];
    documents.extend(structural(&ContainerXml));
    if book.viewport.is_some() {
        documents.extend(structural(&DisplayOptions));
    }
    documents.extend(structural(&PackageDocument {
        book,
        items: &manifest.items,
        spine: &manifest.spine,
        cover_id: manifest.cover_id.as_deref(),
    }));
    documents.extend(structural(&NavDocument {
        title: &book.title,
        language,
        entries: &manifest.toc,
        styles: &manifest.styles,
    }));
    documents.extend(structural(&NcxDocument {
        uid: &book.identifier.urn(),
        title: &book.title,
        entries: &manifest.toc,
    }));
    documents
}

/// Render a template that lives at a fixed path.
fn structural<T: Template>(template: &T) -> Option<(&'static str, String)> {
    T::ID.path().map(|path| (path, template.render()))
}

/// Build the manifest and write every structural document to `storage`.
pub async fn write_manifest<S: Storage>(
    book: &ResolvedBook,
    assets: &ResolvedAssets,
    pages: &TransformedPages,
    storage: &S,
) -> Result<Manifest> {
    let manifest = build_manifest(assets, pages);
    let documents = render_documents(book, &manifest);

    try_join_all(documents.into_iter().map(|(path, contents)| async move {
        storage
            .write(path, contents.into_bytes())
            .await
            .map_err(|cause| Error::ManifestWriteFailed {
                path: path.to_string(),
                cause,
            })?;
        debug!("Wrote {path}");
        Ok::<_, Error>(())
    }))
    .await?;

    info!(
        "Built manifest with {} items and {} navigation entries",
        manifest.items.len(),
        manifest.toc.len()
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, AssetKind};
    use crate::transform::{PAGE_MEDIA_TYPE, TransformedPage};

    fn asset(id: &str, href: &str, kind: AssetKind, is_cover: bool) -> Asset {
        Asset {
            id: id.to_string(),
            source: format!("https://x.test/{href}"),
            href: href.to_string(),
            media_type: "image/png".to_string(),
            kind,
            is_cover,
        }
    }

    fn page(index: usize, toc: bool, scripted: bool) -> TransformedPage {
        let id = crate::transform::page_id(index);
        TransformedPage {
            href: format!("{id}.html"),
            label: format!("Page {}", index + 1),
            id,
            media_type: PAGE_MEDIA_TYPE,
            scripted,
            toc,
            body: String::new(),
        }
    }

    #[test]
    fn test_manifest_order_and_indices() {
        let assets = ResolvedAssets {
            media: vec![asset("cover-image", "assets/c.png", AssetKind::Media, true)],
            styles: vec![asset("css_0", "styles/css_0.css", AssetKind::Style, false)],
            scripts: vec![asset("js_0", "scripts/js_0.js", AssetKind::Script, false)],
            page_bodies: vec![],
        };
        let pages = TransformedPages {
            pages: vec![page(0, false, true), page(1, true, true)],
        };

        let manifest = build_manifest(&assets, &pages);
        let ids: Vec<_> = manifest.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["cover-image", "css_0", "js_0", "e00000", "e00001", "toc", "ncx"]
        );
        let indices: Vec<_> = manifest.items.iter().map(|i| i.index).collect();
        assert_eq!(indices, (1..=7).collect::<Vec<_>>());

        assert_eq!(
            manifest.item("cover-image").and_then(|i| i.properties.as_deref()),
            Some("cover-image")
        );
        assert_eq!(
            manifest.item("e00000").and_then(|i| i.properties.as_deref()),
            Some("scripted")
        );
        assert_eq!(
            manifest.item("toc").and_then(|i| i.properties.as_deref()),
            Some("nav")
        );
        assert_eq!(manifest.spine, vec!["e00000", "e00001"]);
        assert_eq!(manifest.cover_id.as_deref(), Some("cover-image"));
        assert_eq!(manifest.styles, vec!["styles/css_0.css"]);
    }

    #[test]
    fn test_toc_defaults_to_first_page() {
        let pages = TransformedPages {
            pages: vec![page(0, false, false), page(1, false, false)],
        };
        let manifest = build_manifest(&ResolvedAssets::default(), &pages);
        assert_eq!(
            manifest.toc,
            vec![NavEntry {
                index: 1,
                label: "Page 1".to_string(),
                href: "e00000.html".to_string(),
            }]
        );
    }

    #[test]
    fn test_render_documents_paths() {
        let spec = crate::BookSpec::new("T", "data:image/png;base64,iVBORw0KGgo=")
            .with_page(crate::PageSpec::new("<p>x</p>"));
        let pages = TransformedPages {
            pages: vec![page(0, false, false)],
        };
        let manifest = build_manifest(&ResolvedAssets::default(), &pages);

        let book = crate::book::defaults::resolve(&spec).unwrap();
        let paths: Vec<_> = render_documents(&book, &manifest)
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "mimetype",
                "META-INF/container.xml",
                "OEBPS/content.opf",
                "OEBPS/toc.html",
                "OEBPS/toc.ncx",
            ]
        );

        let fixed = crate::book::defaults::resolve(&spec.with_fixed_format(600, 800)).unwrap();
        let documents = render_documents(&fixed, &manifest);
        assert_eq!(
            documents[2].0,
            "META-INF/com.apple.ibooks.display-options.xml"
        );
        assert!(documents[2].1.contains("fixed-layout"));
    }
}
