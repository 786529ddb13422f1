//! Identifier and defaults resolution.
//!
//! Validates a [`BookSpec`] and produces the normalized, immutable
//! [`ResolvedBook`] every later stage reads from.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use log::{debug, warn};

use super::{BookSpec, Contributor, DateInput, OneOrMany};
use crate::error::{Error, Result};
use crate::util::uuid_v4;

/// Language used when the book declares none.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// The primary identifier of a book, chosen by precedence isbn > url > uuid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Isbn(String),
    Url(String),
    Uuid(String),
}

impl Identifier {
    /// The raw identifier value.
    pub fn value(&self) -> &str {
        match self {
            Identifier::Isbn(v) | Identifier::Url(v) | Identifier::Uuid(v) => v,
        }
    }

    /// The identifier as written in the package metadata.
    pub fn urn(&self) -> String {
        match self {
            Identifier::Isbn(isbn) => format!("urn:isbn:{isbn}"),
            Identifier::Url(url) => url.clone(),
            Identifier::Uuid(uuid) => format!("urn:uuid:{uuid}"),
        }
    }
}

/// A page after defaults resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    pub body: String,
    pub toc: bool,
    pub title: Option<String>,
}

/// Declared fixed-layout viewport in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Style rule pinning the body to the viewport size.
    pub fn style_rule(&self) -> String {
        format!(
            "body {{ width: {}px;height: {}px;margin: 0; }}",
            self.width, self.height
        )
    }
}

/// A validated book with every default filled in.
#[derive(Debug, Clone)]
pub struct ResolvedBook {
    pub title: String,
    pub cover: String,
    pub pages: Vec<ResolvedPage>,
    /// Style sources in final order; the viewport rule leads for fixed layouts.
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
    pub creators: Vec<Contributor>,
    pub contributors: Vec<Contributor>,
    pub subjects: Vec<String>,
    pub publishers: Vec<String>,
    pub languages: Vec<String>,
    pub description: Option<String>,
    pub rights: Option<String>,
    /// Publication date, `YYYY-MM-DD`.
    pub date: String,
    /// Modification timestamp, `YYYY-MM-DDTHH:MM:SSZ`.
    pub modified: String,
    pub identifier: Identifier,
    pub viewport: Option<Viewport>,
}

impl ResolvedBook {
    pub fn isbn(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::Isbn(v) => Some(v),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::Url(v) => Some(v),
            _ => None,
        }
    }

    pub fn uuid(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::Uuid(v) => Some(v),
            _ => None,
        }
    }

    /// Pages flagged for the table of contents.
    pub fn toc_pages(&self) -> impl Iterator<Item = (usize, &ResolvedPage)> {
        self.pages.iter().enumerate().filter(|(_, page)| page.toc)
    }
}

/// Validate `spec` and fill in defaults.
///
/// Performs no I/O, so validation failures surface before any fetch starts.
pub fn resolve(spec: &BookSpec) -> Result<ResolvedBook> {
    let title = required(&spec.title, "title")?;
    let cover = required(&spec.cover, "cover")?;
    let viewport = resolve_viewport(spec)?;

    let mut styles = Vec::new();
    if let Some(viewport) = viewport {
        styles.push(viewport.style_rule());
    }
    styles.extend(spec.css.clone().map(OneOrMany::into_vec).unwrap_or_default());
    let scripts = spec.js.clone().map(OneOrMany::into_vec).unwrap_or_default();

    let mut languages = plural(&spec.language, &spec.languages);
    if languages.is_empty() {
        languages.push(DEFAULT_LANGUAGE.to_string());
    }

    let identifier = resolve_identifier(
        spec.isbn.as_deref(),
        spec.url.as_deref(),
        spec.uuid.as_deref(),
    );
    debug!("Resolved identifier {identifier:?} for '{title}'");

    Ok(ResolvedBook {
        title,
        cover,
        pages: spec
            .pages
            .iter()
            .map(|page| ResolvedPage {
                body: page.body.clone(),
                toc: page.toc,
                title: page.title.clone().filter(|t| !t.trim().is_empty()),
            })
            .collect(),
        styles,
        scripts,
        creators: contributors(&spec.creator, &spec.creators),
        contributors: contributors(&spec.contributor, &spec.contributors),
        subjects: plural(&spec.subject, &spec.subjects),
        publishers: plural(&spec.publisher, &spec.publishers),
        languages,
        description: spec.description.clone().filter(|d| !d.is_empty()),
        rights: spec.rights.clone().filter(|r| !r.is_empty()),
        date: resolve_date(spec.date.as_ref()),
        modified: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        identifier,
        viewport,
    })
}

fn required(value: &Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(Error::MissingRequiredField { field }),
    }
}

fn resolve_viewport(spec: &BookSpec) -> Result<Option<Viewport>> {
    let Some(fixed) = &spec.fixed_format else {
        return Ok(None);
    };
    let (Some(w), Some(h)) = (&fixed.w, &fixed.h) else {
        return Err(Error::InvalidFixedLayout {
            reason: "both w and h are required".to_string(),
        });
    };
    match (w.pixels(), h.pixels()) {
        (Some(width), Some(height)) => Ok(Some(Viewport { width, height })),
        _ => Err(Error::InvalidFixedLayout {
            reason: format!("{w:?} x {h:?} is not a pixel size"),
        }),
    }
}

/// Pick the primary identifier: isbn, then url, then the given or a new uuid.
///
/// Empty strings count as absent.
pub fn resolve_identifier(isbn: Option<&str>, url: Option<&str>, uuid: Option<&str>) -> Identifier {
    let present = |v: Option<&str>| v.filter(|v| !v.is_empty()).map(str::to_string);

    if let Some(isbn) = present(isbn) {
        Identifier::Isbn(isbn)
    } else if let Some(url) = present(url) {
        Identifier::Url(url)
    } else {
        Identifier::Uuid(present(uuid).unwrap_or_else(uuid_v4))
    }
}

/// Format the publication date as `YYYY-MM-DD`, falling back to today.
pub fn resolve_date(date: Option<&DateInput>) -> String {
    let parsed = match date {
        None => None,
        Some(DateInput::Millis(ms)) => DateTime::from_timestamp_millis(*ms).map(|d| d.date_naive()),
        Some(DateInput::Text(text)) => parse_date(text.trim()),
    };

    let date = match parsed {
        Some(date) => date,
        None => {
            if date.is_some() {
                warn!("Unparseable date {date:?}, using today");
            }
            Local::now().date_naive()
        }
    };
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(text) {
        return Some(datetime.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Merge a singular field into its plural form, dropping empty placeholders.
fn plural(one: &Option<OneOrMany<String>>, many: &Option<Vec<String>>) -> Vec<String> {
    let values = match (many, one) {
        (Some(many), _) => many.clone(),
        (None, Some(one)) => one.clone().into_vec(),
        (None, None) => Vec::new(),
    };
    values.into_iter().filter(|v| !v.trim().is_empty()).collect()
}

fn contributors(
    one: &Option<OneOrMany<Contributor>>,
    many: &Option<Vec<Contributor>>,
) -> Vec<Contributor> {
    let values = match (many, one) {
        (Some(many), _) => many.clone(),
        (None, Some(one)) => one.clone().into_vec(),
        (None, None) => Vec::new(),
    };
    values
        .into_iter()
        .filter(|c| !c.name().trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{Dimension, FixedFormat, PageSpec};

    fn minimal() -> BookSpec {
        BookSpec::new("Title", "cover.jpg").with_page(PageSpec::new("<p>Hi</p>"))
    }

    #[test]
    fn test_missing_title() {
        let mut spec = minimal();
        spec.title = None;
        let err = resolve(&spec).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { field: "title" }));
    }

    #[test]
    fn test_empty_cover_is_missing() {
        let mut spec = minimal();
        spec.cover = Some(String::new());
        let err = resolve(&spec).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { field: "cover" }));
    }

    #[test]
    fn test_defaults() {
        let book = resolve(&minimal()).expect("resolves");
        assert_eq!(book.languages, vec![DEFAULT_LANGUAGE]);
        assert_eq!(book.date.len(), 10);
        assert!(book.modified.ends_with('Z'));
        assert!(book.uuid().is_some());
        assert!(book.isbn().is_none());
        assert!(book.url().is_none());
    }

    #[test]
    fn test_isbn_wins() {
        let book = resolve(&minimal().with_isbn("978-3").with_url("https://x")).expect("resolves");
        assert_eq!(book.identifier, Identifier::Isbn("978-3".into()));
        assert_eq!(book.url(), None);
        assert_eq!(book.uuid(), None);
        assert_eq!(book.identifier.urn(), "urn:isbn:978-3");
    }

    #[test]
    fn test_url_when_isbn_empty() {
        let book = resolve(&minimal().with_isbn("").with_url("https://x")).expect("resolves");
        assert_eq!(book.identifier, Identifier::Url("https://x".into()));
    }

    #[test]
    fn test_supplied_uuid_is_kept() {
        let mut spec = minimal();
        spec.uuid = Some("abc".into());
        let book = resolve(&spec).expect("resolves");
        assert_eq!(book.uuid(), Some("abc"));
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(
            resolve_date(Some(&DateInput::Text("2013-03-20T12:00:00Z".into()))),
            "2013-03-20"
        );
        assert_eq!(
            resolve_date(Some(&DateInput::Text("March 5, 2001".into()))),
            "2001-03-05"
        );
        assert_eq!(resolve_date(Some(&DateInput::Millis(0))), "1970-01-01");
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(resolve_date(Some(&DateInput::Text("not a date".into()))), today);
    }

    #[test]
    fn test_plural_fields_drop_placeholders() {
        let mut spec = minimal();
        spec.subject = Some(OneOrMany::One(String::new()));
        spec.publisher = Some(OneOrMany::One("Press".into()));
        spec.language = Some(OneOrMany::One("fr".into()));
        spec.creator = Some(OneOrMany::One(Contributor::from("")));
        let book = resolve(&spec).expect("resolves");
        assert!(book.subjects.is_empty());
        assert_eq!(book.publishers, vec!["Press"]);
        assert_eq!(book.languages, vec!["fr"]);
        assert!(book.creators.is_empty());
    }

    #[test]
    fn test_plural_field_takes_precedence() {
        let mut spec = minimal();
        spec.subject = Some(OneOrMany::One("ignored".into()));
        spec.subjects = Some(vec!["kept".into()]);
        let book = resolve(&spec).expect("resolves");
        assert_eq!(book.subjects, vec!["kept"]);
    }

    #[test]
    fn test_fixed_layout_injects_rule_first() {
        let spec = minimal().with_css("p {}").with_fixed_format(600, 800);
        let book = resolve(&spec).expect("resolves");
        assert_eq!(book.viewport, Some(Viewport { width: 600, height: 800 }));
        assert_eq!(book.styles.len(), 2);
        assert_eq!(book.styles[0], "body { width: 600px;height: 800px;margin: 0; }");
        assert_eq!(book.styles[1], "p {}");
    }

    #[test]
    fn test_fixed_layout_requires_both_dimensions() {
        let mut spec = minimal();
        spec.fixed_format = Some(FixedFormat {
            w: Some(Dimension::Pixels(600)),
            h: None,
        });
        let err = resolve(&spec).unwrap_err();
        assert!(matches!(err, Error::InvalidFixedLayout { .. }));
    }
}
