//! Declarative book description.
//!
//! A [`BookSpec`] is what callers hand to the assembler, usually deserialized
//! from JSON:
//!
//! ```
//! use folio::BookSpec;
//!
//! let spec: BookSpec = serde_json::from_str(r#"{
//!     "title": "Field Notes",
//!     "cover": "https://example.com/cover.jpg",
//!     "pages": [{ "body": "<h1>One</h1>", "toc": true }],
//!     "css": "p { margin: 0 }",
//!     "creator": "A. Writer"
//! }"#).unwrap();
//!
//! assert_eq!(spec.pages.len(), 1);
//! ```
//!
//! A `BookSpec` is never mutated by the pipeline; [`defaults::resolve`] turns it
//! into a normalized [`ResolvedBook`].

pub mod defaults;

use serde::Deserialize;

pub use defaults::{Identifier, ResolvedBook, ResolvedPage, Viewport};

/// Input description of a book.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookSpec {
    pub title: Option<String>,
    pub cover: Option<String>,
    pub pages: Vec<PageSpec>,
    pub css: Option<OneOrMany<String>>,
    pub js: Option<OneOrMany<String>>,

    pub creator: Option<OneOrMany<Contributor>>,
    pub creators: Option<Vec<Contributor>>,
    pub contributor: Option<OneOrMany<Contributor>>,
    pub contributors: Option<Vec<Contributor>>,
    pub subject: Option<OneOrMany<String>>,
    pub subjects: Option<Vec<String>>,
    pub publisher: Option<OneOrMany<String>>,
    pub publishers: Option<Vec<String>>,
    pub language: Option<OneOrMany<String>>,
    pub languages: Option<Vec<String>>,
    pub description: Option<String>,
    pub rights: Option<String>,
    pub date: Option<DateInput>,

    pub isbn: Option<String>,
    pub url: Option<String>,
    pub uuid: Option<String>,

    pub fixed_format: Option<FixedFormat>,
}

impl BookSpec {
    pub fn new(title: impl Into<String>, cover: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            cover: Some(cover.into()),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: PageSpec) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        push_one(&mut self.css, css.into());
        self
    }

    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        push_one(&mut self.js, js.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<Contributor>) -> Self {
        self.creators.get_or_insert_with(Vec::new).push(creator.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_fixed_format(mut self, width: u32, height: u32) -> Self {
        self.fixed_format = Some(FixedFormat {
            w: Some(Dimension::Pixels(width)),
            h: Some(Dimension::Pixels(height)),
        });
        self
    }
}

fn push_one(slot: &mut Option<OneOrMany<String>>, value: String) {
    let mut values = slot.take().map(OneOrMany::into_vec).unwrap_or_default();
    values.push(value);
    *slot = Some(OneOrMany::Many(values));
}

/// One page of content.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    /// HTML body fragment, or a `file://` locator of an HTML document.
    pub body: String,
    /// Whether the page gets an entry in the table of contents.
    pub toc: bool,
    /// Label for the table of contents.
    pub title: Option<String>,
}

impl PageSpec {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn in_toc(mut self) -> Self {
        self.toc = true;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A field accepting either a single value or a list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// A creator or contributor, either a bare name or a detailed record.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Contributor {
    Name(String),
    #[serde(rename_all = "camelCase")]
    Detailed {
        name: String,
        role: Option<String>,
        file_as: Option<String>,
    },
}

impl Contributor {
    pub fn name(&self) -> &str {
        match self {
            Contributor::Name(name) => name,
            Contributor::Detailed { name, .. } => name,
        }
    }

    /// MARC relator code, e.g. `aut` or `ill`.
    pub fn role(&self) -> Option<&str> {
        match self {
            Contributor::Name(_) => None,
            Contributor::Detailed { role, .. } => role.as_deref(),
        }
    }

    pub fn file_as(&self) -> Option<&str> {
        match self {
            Contributor::Name(_) => None,
            Contributor::Detailed { file_as, .. } => file_as.as_deref(),
        }
    }
}

impl From<&str> for Contributor {
    fn from(name: &str) -> Self {
        Contributor::Name(name.to_string())
    }
}

impl From<String> for Contributor {
    fn from(name: String) -> Self {
        Contributor::Name(name)
    }
}

/// Publication date as text or as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DateInput {
    Millis(i64),
    Text(String),
}

/// Declared fixed-layout page size.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FixedFormat {
    pub w: Option<Dimension>,
    pub h: Option<Dimension>,
}

/// A pixel dimension given as a number or as text like `"768px"`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(u32),
    Text(String),
}

impl Dimension {
    /// The leading integer value, if there is one.
    pub fn pixels(&self) -> Option<u32> {
        match self {
            Dimension::Pixels(px) => Some(*px),
            Dimension::Text(text) => {
                let text = text.trim();
                let end = text
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(text.len());
                text[..end].parse().ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_singular_and_plural_fields() {
        let spec: BookSpec = serde_json::from_str(
            r#"{
                "title": "T",
                "cover": "c.jpg",
                "pages": [{"body": "<p>x</p>"}],
                "css": "body {}",
                "js": ["a()", "b()"],
                "creator": {"name": "Ann", "role": "aut", "fileAs": "Ann, A"},
                "contributors": ["Bob"],
                "fixedFormat": {"w": 600, "h": "800px"}
            }"#,
        )
        .expect("valid book json");

        assert_eq!(spec.css, Some(OneOrMany::One("body {}".to_string())));
        assert_eq!(spec.js.map(OneOrMany::into_vec).map(|v| v.len()), Some(2));
        let creator = spec.creator.expect("creator").into_vec().remove(0);
        assert_eq!(creator.name(), "Ann");
        assert_eq!(creator.role(), Some("aut"));
        assert_eq!(creator.file_as(), Some("Ann, A"));
        assert_eq!(spec.contributors, Some(vec![Contributor::from("Bob")]));
        let fixed = spec.fixed_format.expect("fixed format");
        assert_eq!(fixed.w.and_then(|d| d.pixels()), Some(600));
        assert_eq!(fixed.h.and_then(|d| d.pixels()), Some(800));
        assert!(!spec.pages[0].toc);
    }

    #[test]
    fn test_deserialize_date_forms() {
        let spec: BookSpec = serde_json::from_str(r#"{"date": 86400000}"#).expect("json");
        assert_eq!(spec.date, Some(DateInput::Millis(86_400_000)));

        let spec: BookSpec = serde_json::from_str(r#"{"date": "2013-03-20"}"#).expect("json");
        assert_eq!(spec.date, Some(DateInput::Text("2013-03-20".to_string())));
    }

    #[test]
    fn test_builder_accumulates_css() {
        let spec = BookSpec::new("T", "c.jpg").with_css("a {}").with_css("b {}");
        assert_eq!(
            spec.css.map(OneOrMany::into_vec),
            Some(vec!["a {}".to_string(), "b {}".to_string()])
        );
    }

    #[test]
    fn test_dimension_without_digits() {
        assert_eq!(Dimension::Text("wide".into()).pixels(), None);
    }
}
