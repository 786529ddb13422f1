//! Arena DOM that html5ever parses page markup into.
//!
//! Nodes live in one vector and refer to each other by [`NodeId`]. Each node
//! owns the ordered list of its children, so document order is a plain
//! pre-order walk. Attributes are rewritten in place.

use html5ever::{LocalName, QualName, ns};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

const DOCUMENT: NodeId = NodeId(0);

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element { name: QualName, attrs: Vec<Attribute> },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

pub struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    /// An empty tree holding only the document node.
    pub fn new() -> Self {
        let mut dom = Self { nodes: Vec::new() };
        dom.create(NodeData::Document);
        dom
    }

    pub fn document(&self) -> NodeId {
        DOCUMENT
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Allocate a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Append text to `parent`, extending its last child if that is text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last = self.get(parent).and_then(|node| node.children.last().copied());
        if let Some(Node {
            data: NodeData::Text(existing),
            ..
        }) = last.and_then(|id| self.get_mut(id))
        {
            existing.push_str(text);
            return;
        }
        let node = self.create(NodeData::Text(text.to_string()));
        self.append(parent, node);
    }

    /// Move `child` directly in front of `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, child: NodeId) {
        let Some(parent) = self.get(sibling).and_then(Node::parent) else {
            return;
        };
        self.detach(child);
        if let Some(node) = self.get_mut(parent) {
            let at = node
                .children
                .iter()
                .position(|&id| id == sibling)
                .unwrap_or(node.children.len());
            node.children.insert(at, child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Unlink `id` from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get_mut(id).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|&child| child != id);
        }
    }

    pub fn children(&self, id: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }

    /// `id` and its siblings, in order.
    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .and_then(Node::parent)
            .and_then(|parent| self.get(parent))
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// All nodes below `root` in document order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).rev());
        }
        out
    }

    /// First element named `tag` in document order.
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        self.descendants(DOCUMENT)
            .into_iter()
            .find(|&id| self.local_name(id).is_some_and(|name| name.as_ref() == tag))
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// Element accessors.
impl Dom {
    pub fn name(&self, id: NodeId) -> Option<&QualName> {
        match &self.get(id)?.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn local_name(&self, id: NodeId) -> Option<&LocalName> {
        self.name(id).map(|name| &name.local)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.name(id).is_some()
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match self.get(id).map(|node| &node.data) {
            Some(NodeData::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|attr| attr.name.local.as_ref() == name)
            .map(|attr| attr.value.as_str())
    }

    fn attrs_mut(&mut self, id: NodeId) -> Option<&mut Vec<Attribute>> {
        match &mut self.get_mut(id)?.data {
            NodeData::Element { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    /// Set `name`, adding the attribute when absent.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let Some(attrs) = self.attrs_mut(id) else {
            return;
        };
        let value = value.into();
        match attrs.iter_mut().find(|attr| attr.name.local.as_ref() == name) {
            Some(attr) => attr.value = value,
            None => attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(name)),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attrs = self.attrs_mut(id)?;
        let at = attrs
            .iter()
            .position(|attr| attr.name.local.as_ref() == name)?;
        Some(attrs.remove(at).value)
    }

    /// Concatenated text below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        std::iter::once(id)
            .chain(self.descendants(id))
            .filter_map(|node| match self.get(node).map(|n| &n.data) {
                Some(NodeData::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
