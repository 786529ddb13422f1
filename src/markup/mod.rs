//! HTML handling for page bodies.
//!
//! Pages arrive as HTML fragments. [`Fragment`] parses one with html5ever,
//! answers CSS selector queries, lets callers rewrite attributes, and writes
//! the result back out as EPUB-ready XHTML.

mod arena;
mod element_ref;
mod serialize;
mod tree_sink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use selectors::context::{MatchingContext, SelectorCaches};
use selectors::parser::Selector;

pub use arena::{Dom, NodeId};
pub use serialize::{escape_attribute, escape_numeric};

use crate::error::{Error, Result};
use element_ref::{ElementRef, FolioSelectors};
use serialize::Syntax;
use tree_sink::DomSink;

/// A parsed body fragment.
pub struct Fragment {
    dom: Dom,
    body: NodeId,
}

impl Fragment {
    /// Parse an HTML body fragment.
    pub fn parse(html: &str) -> Self {
        let mut wrapped = String::with_capacity(html.len() + 40);
        wrapped.push_str("<html><head></head><body>");
        wrapped.push_str(html);
        wrapped.push_str("</body></html>");
        Self::parse_document(&wrapped)
    }

    /// Parse a complete HTML document, keeping only its `<body>`.
    pub fn parse_document(html: &str) -> Self {
        let dom = parse_document(DomSink::new(), ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_dom();
        let body = dom.find_element("body").unwrap_or(dom.document());
        Self { dom, body }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Elements under the body matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = parse_selectors(selector)?;
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            selectors::matching::MatchingMode::Normal,
            None,
            &mut caches,
            selectors::context::QuirksMode::NoQuirks,
            selectors::matching::NeedsSelectorFlags::No,
            selectors::matching::MatchingForInvalidation::No,
        );

        Ok(self
            .dom
            .descendants(self.body)
            .into_iter()
            .filter(|&id| self.dom.is_element(id))
            .filter(|&id| {
                let elem = ElementRef::new(&self.dom, id);
                list.iter().any(|selector| {
                    selectors::matching::matches_selector(selector, 0, None, &elem, &mut context)
                })
            })
            .collect())
    }

    /// Values of `attr` on every element matching `selector`.
    pub fn attr_values(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        Ok(self
            .select(selector)?
            .into_iter()
            .filter_map(|id| self.dom.attr(id, attr).map(str::to_string))
            .collect())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.dom.attr(id, name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        self.dom.set_attr(id, name, value);
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.dom.remove_attr(id, name)
    }

    /// Trimmed text of the first `h1`..`h6` in the body.
    pub fn first_heading(&self) -> Option<String> {
        self.select("h1, h2, h3, h4, h5, h6")
            .ok()?
            .into_iter()
            .map(|id| collapse_whitespace(&self.dom.text_content(id)))
            .find(|text| !text.is_empty())
    }

    /// Serialize the body content as XHTML.
    pub fn to_xhtml(&self) -> String {
        serialize::serialize_children(&self.dom, self.body, Syntax::Xhtml)
    }

    /// Serialize the body content as HTML that parses back to the same tree.
    pub fn to_html(&self) -> String {
        serialize::serialize_children(&self.dom, self.body, Syntax::Html)
    }
}

fn parse_selectors(selector: &str) -> Result<Vec<Selector<FolioSelectors>>> {
    let mut input = cssparser::ParserInput::new(selector);
    let mut parser = cssparser::Parser::new(&mut input);
    let list = selectors::parser::SelectorList::parse(
        &FolioSelectors,
        &mut parser,
        selectors::parser::ParseRelative::No,
    )
    .map_err(|_| Error::InvalidSelector(selector.to_string()))?;
    Ok(list.slice().to_vec())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_tag_and_attribute() {
        let fragment = Fragment::parse(
            r#"<p><img src="a.png"><img src="b.png"></p><video poster="p.jpg"><source src="v.mp4"></video>"#,
        );

        assert_eq!(
            fragment.attr_values("img", "src").unwrap(),
            vec!["a.png", "b.png"]
        );
        assert_eq!(
            fragment.attr_values("video source", "src").unwrap(),
            vec!["v.mp4"]
        );
        assert_eq!(fragment.select("img[src='b.png']").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_selector() {
        let fragment = Fragment::parse("<p></p>");
        assert!(matches!(
            fragment.select("p[[["),
            Err(Error::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_to_xhtml_self_closes_void_and_empty_anchor() {
        let fragment = Fragment::parse(r#"<img src="x"><hr><br><a id="n"></a><a href="y">y</a>"#);
        assert_eq!(
            fragment.to_xhtml(),
            r#"<img src="x" /><hr /><br /><a id="n" /><a href="y">y</a>"#
        );
    }

    #[test]
    fn test_to_xhtml_uses_numeric_entities() {
        let fragment = Fragment::parse("<p title=\"&quot;q&quot;\">&copy; 2013 &amp; caf&eacute;</p>");
        assert_eq!(
            fragment.to_xhtml(),
            "<p title=\"&#34;q&#34;\">&#169; 2013 &#38; caf&#233;</p>"
        );
    }

    #[test]
    fn test_script_text_is_escaped() {
        let fragment = Fragment::parse("<script>if (a < b && c) {}</script>");
        assert_eq!(
            fragment.to_xhtml(),
            "<script>if (a &#60; b &#38;&#38; c) {}</script>"
        );
    }

    #[test]
    fn test_comment_stays_well_formed() {
        let fragment = Fragment::parse("<p><!--a--b--></p>");
        assert_eq!(fragment.to_xhtml(), "<p><!--a- -b--></p>");
    }

    #[test]
    fn test_to_html_round_trips() {
        let source = r#"<a name="top"></a><p>Hello &amp; caf&eacute;</p><br><script>a < b</script>"#;
        let html = Fragment::parse(source).to_html();
        assert_eq!(
            html,
            r#"<a name="top"></a><p>Hello &#38; caf&#233;</p><br><script>a < b</script>"#
        );
        assert_eq!(
            Fragment::parse(&html).to_xhtml(),
            r#"<a name="top" /><p>Hello &#38; caf&#233;</p><br /><script>a &#60; b</script>"#
        );
    }

    #[test]
    fn test_set_and_remove_attr() {
        let mut fragment = Fragment::parse(r#"<a name="n"></a>"#);
        let anchor = fragment.select("a[name]").unwrap()[0];
        fragment.set_attr(anchor, "id", "n");
        fragment.remove_attr(anchor, "name");
        assert_eq!(fragment.to_xhtml(), r#"<a id="n" />"#);
    }

    #[test]
    fn test_first_heading() {
        let fragment = Fragment::parse("<p>intro</p><h2>  Chapter\n One </h2><h1>Later</h1>");
        assert_eq!(fragment.first_heading().as_deref(), Some("Chapter One"));
        assert_eq!(Fragment::parse("<p>none</p>").first_heading(), None);
    }

    #[test]
    fn test_parse_document_keeps_body_only() {
        let fragment = Fragment::parse_document(
            "<html><head><title>T</title></head><body><p>Body</p></body></html>",
        );
        assert_eq!(fragment.to_xhtml(), "<p>Body</p>");
    }
}
