//! Page transformation.
//!
//! Each page body is rewritten to point at the local copies of its media,
//! legacy `<a name>` anchors become ids, and the result is serialized as
//! XHTML inside a page document written to `OEBPS/eNNNNN.html`.

use std::collections::HashMap;

use futures::future::try_join_all;
use log::{debug, info};

use crate::assets::{CONTENT_DIR, ResolvedAssets};
use crate::book::ResolvedBook;
use crate::error::{Error, Result};
use crate::export::templates::{PageDocument, Template};
use crate::io::Storage;
use crate::markup::Fragment;

pub const PAGE_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Attributes that may reference a media asset, by selector.
const MEDIA_ATTRIBUTES: &[(&str, &str)] = &[
    ("img", "src"),
    ("video", "src"),
    ("video", "poster"),
    ("video source", "src"),
    ("audio", "src"),
    ("audio source", "src"),
];

/// A page after transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedPage {
    /// Manifest id, `e00000` for the first page.
    pub id: String,
    /// Path relative to the content directory.
    pub href: String,
    pub media_type: &'static str,
    pub scripted: bool,
    pub toc: bool,
    /// Label used in the table of contents.
    pub label: String,
    /// Rewritten body content as XHTML.
    pub body: String,
}

impl TransformedPage {
    pub fn path(&self) -> String {
        format!("{CONTENT_DIR}/{}", self.href)
    }

    pub fn properties(&self) -> Option<&'static str> {
        self.scripted.then_some("scripted")
    }
}

/// Output of the page stage, in book order.
#[derive(Debug, Clone, Default)]
pub struct TransformedPages {
    pub pages: Vec<TransformedPage>,
}

impl TransformedPages {
    /// Pages flagged for the table of contents, or the first page if none is.
    pub fn toc_pages(&self) -> Vec<&TransformedPage> {
        let flagged: Vec<_> = self.pages.iter().filter(|page| page.toc).collect();
        if flagged.is_empty() {
            self.pages.iter().take(1).collect()
        } else {
            flagged
        }
    }
}

/// Zero-padded page id for position `index`.
pub fn page_id(index: usize) -> String {
    format!("e{index:05}")
}

/// Rewrite one page body.
///
/// Returns the XHTML body and the text of its first heading.
pub fn transform_body(body: &str, assets: &ResolvedAssets) -> Result<(String, Option<String>)> {
    let mut fragment = Fragment::parse(body);

    let hrefs: HashMap<&str, String> = assets
        .media
        .iter()
        .map(|asset| (asset.source.as_str(), asset.url()))
        .collect();
    for (selector, attr) in MEDIA_ATTRIBUTES {
        for id in fragment.select(&format!("{selector}[{attr}]"))? {
            let local = fragment.attr(id, attr).and_then(|src| hrefs.get(src)).cloned();
            if let Some(href) = local {
                fragment.set_attr(id, attr, href);
            }
        }
    }

    for id in fragment.select("a[name]")? {
        if let Some(name) = fragment.remove_attr(id, "name")
            && fragment.attr(id, "id").is_none()
        {
            fragment.set_attr(id, "id", name);
        }
    }

    Ok((fragment.to_xhtml(), fragment.first_heading()))
}

/// Transform every page and write its document to `storage`.
pub async fn transform_pages<S: Storage>(
    book: &ResolvedBook,
    assets: &ResolvedAssets,
    storage: &S,
) -> Result<TransformedPages> {
    let scripted = !assets.scripts.is_empty();
    let styles: Vec<String> = assets.styles.iter().map(|a| a.url()).collect();
    let scripts: Vec<String> = assets.scripts.iter().map(|a| a.url()).collect();
    let language = book
        .languages
        .first()
        .map(String::as_str)
        .unwrap_or(crate::book::defaults::DEFAULT_LANGUAGE);

    let mut pages = Vec::with_capacity(book.pages.len());
    let mut documents = Vec::with_capacity(book.pages.len());
    for (index, (page, body)) in book.pages.iter().zip(&assets.page_bodies).enumerate() {
        let (body, heading) = transform_body(body, assets)?;
        let label = page
            .title
            .clone()
            .or(heading)
            .unwrap_or_else(|| format!("Page {}", index + 1));

        let id = page_id(index);
        let transformed = TransformedPage {
            href: format!("{id}.html"),
            id,
            media_type: PAGE_MEDIA_TYPE,
            scripted,
            toc: page.toc,
            label,
            body,
        };

        let document = PageDocument {
            title: &transformed.label,
            language,
            body: &transformed.body,
            styles: &styles,
            scripts: &scripts,
            viewport: book.viewport,
        }
        .render();
        documents.push((transformed.path(), document));
        pages.push(transformed);
    }

    try_join_all(documents.into_iter().map(|(path, document)| async move {
        storage
            .write(&path, document.into_bytes())
            .await
            .map_err(|cause| Error::PageWriteFailed {
                path: path.clone(),
                cause,
            })?;
        debug!("Wrote page {path}");
        Ok::<_, Error>(())
    }))
    .await?;

    info!("Transformed {} pages", pages.len());
    Ok(TransformedPages { pages })
}
