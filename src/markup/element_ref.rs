//! CSS selector matching over [`Dom`] elements.
//!
//! Only type, class, id, attribute and structural selectors are needed to
//! find media references, so pseudo-classes and pseudo-elements never parse.

use std::fmt;

use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::context::MatchingContext;
use selectors::matching::ElementSelectorFlags;
use selectors::parser::SelectorParseErrorKind;
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{Dom, NodeData, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioSelectors;

/// Every string a selector carries: names, values, namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssStr(String);

impl From<&str> for CssStr {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for CssStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl cssparser::ToCss for CssStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

// FNV-1a.
impl precomputed_hash::PrecomputedHash for CssStr {
    fn precomputed_hash(&self) -> u32 {
        self.0.bytes().fold(0x811c_9dc5, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
        })
    }
}

/// Stands in for pseudo-classes and pseudo-elements, which never parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoPseudo {}

impl cssparser::ToCss for NoPseudo {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

impl selectors::parser::NonTSPseudoClass for NoPseudo {
    type Impl = FolioSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for NoPseudo {
    type Impl = FolioSelectors;
}

impl SelectorImpl for FolioSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssStr;
    type Identifier = CssStr;
    type LocalName = CssStr;
    type NamespaceUrl = CssStr;
    type NamespacePrefix = CssStr;
    type BorrowedLocalName = CssStr;
    type BorrowedNamespaceUrl = CssStr;
    type NonTSPseudoClass = NoPseudo;
    type PseudoElement = NoPseudo;
}

impl<'i> selectors::parser::Parser<'i> for FolioSelectors {
    type Impl = FolioSelectors;
    type Error = SelectorParseErrorKind<'i>;
}

/// An element of a [`Dom`], as seen by the selector engine.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    dom: &'a Dom,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(dom: &'a Dom, id: NodeId) -> Self {
        Self { dom, id }
    }

    fn wrap(&self, id: NodeId) -> Self {
        Self::new(self.dom, id)
    }

    /// Nearest element sibling before or after this one.
    fn sibling_element(&self, before: bool) -> Option<Self> {
        let siblings = self.dom.siblings(self.id);
        let at = siblings.iter().position(|&id| id == self.id)?;
        let found = if before {
            siblings[..at].iter().rev().find(|&&id| self.dom.is_element(id))
        } else {
            siblings[at + 1..].iter().find(|&&id| self.dom.is_element(id))
        };
        found.map(|&id| self.wrap(id))
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} {:?}>", self.dom.local_name(self.id), self.id)
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = FolioSelectors;

    fn opaque(&self) -> OpaqueElement {
        match self.dom.get(self.id) {
            Some(node) => OpaqueElement::new(node),
            None => OpaqueElement::new(self.dom),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.dom.get(self.id)?.parent()?;
        self.dom.is_element(parent).then(|| self.wrap(parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(true)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(false)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.dom
            .children(self.id)
            .find(|&child| self.dom.is_element(child))
            .map(|child| self.wrap(child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssStr) -> bool {
        self.dom
            .local_name(self.id)
            .is_some_and(|local| &**local == name.0.as_str())
    }

    fn has_namespace(&self, ns: &CssStr) -> bool {
        self.dom
            .name(self.id)
            .is_some_and(|name| &*name.ns == ns.0.as_str())
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.dom.name(self.id) == other.dom.name(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssStr>,
        local_name: &CssStr,
        operation: &AttrSelectorOperation<&CssStr>,
    ) -> bool {
        self.dom
            .attrs(self.id)
            .iter()
            .filter(|attr| &*attr.name.local == local_name.0.as_str())
            .filter(|attr| match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => &*attr.name.ns == ns.0.as_str(),
            })
            .any(|attr| operation.eval_str(&attr.value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NoPseudo,
        _context: &mut MatchingContext<'_, FolioSelectors>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &NoPseudo,
        _context: &mut MatchingContext<'_, FolioSelectors>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .attr(self.id, "id")
            .is_some_and(|own| case_sensitivity.eq(own.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &CssStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom.attr(self.id, "class").is_some_and(|classes| {
            classes
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(class.as_bytes(), name.0.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssStr) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssStr) -> Option<CssStr> {
        None
    }

    fn is_part(&self, _name: &CssStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.dom
            .children(self.id)
            .all(|child| match self.dom.get(child).map(|node| &node.data) {
                Some(NodeData::Element { .. }) => false,
                Some(NodeData::Text(text)) => text.is_empty(),
                _ => true,
            })
    }

    fn is_root(&self) -> bool {
        self.dom
            .get(self.id)
            .and_then(|node| node.parent())
            .is_some_and(|parent| parent == self.dom.document())
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
