//! Arena document model for server-rendered pages.
//!
//! Nodes live in a flat vector and are addressed by [`NodeId`]. Replacing a
//! subtree detaches the old nodes instead of freeing them, so ids handed out
//! earlier stay valid (they just stop being connected to the root).

mod parser;
mod selector;

use thiserror::Error;

pub use selector::Selector;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("html parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unsupported selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("node {index} is not an element")]
    NotAnElement { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena-backed document tree.
///
/// Nodes are never freed: `set_inner_html` detaches the replaced subtree and
/// leaves it in the arena, so every `NodeId` handed out stays valid for the
/// life of the document. Memory grows with each replacement; a long-lived
/// document that is refreshed many times should be re-parsed from `to_html`.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
        }
    }

    /// Parses a full page or a fragment. Unknown markup is kept as text
    /// rather than rejected; only structurally unterminated constructs fail.
    pub fn parse(html: &str) -> Result<Self, DomError> {
        let mut doc = Self::new();
        let root = doc.root;
        parser::parse_into(&mut doc, root, html)?;
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            _ => Err(DomError::NotAnElement { index: id.0 }),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub(crate) fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag: String,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        self.push_node(parent, NodeKind::Element(Element { tag, attrs }))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.push_node(parent, NodeKind::Text(text))
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self.element_mut(id)?;
        match element.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => element.attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.attrs.retain(|(k, _)| k != name);
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
            return;
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        parse_style(self.attr(id, "style")?)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Sets one inline style property, keeping the others in place.
    /// An empty value removes the property.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        let mut decls = parse_style(self.attr(id, "style").unwrap_or(""));
        match decls.iter().position(|(name, _)| name == property) {
            Some(pos) if value.is_empty() => {
                decls.remove(pos);
            }
            Some(pos) => decls[pos].1 = value.to_string(),
            None if value.is_empty() => {}
            None => decls.push((property.to_string(), value.to_string())),
        }
        if decls.is_empty() {
            self.remove_attr(id, "style")
        } else {
            self.set_attr(id, "style", &serialize_style(&decls))
        }
    }

    /// Element descendants of `scope` in document order, `scope` excluded.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(scope, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            if self.is_element(*child) {
                out.push(*child);
            }
            self.collect_descendants(*child, out);
        }
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.is_element(id) && selector.matches(self, id)
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_selector_from(self.root, selector)
    }

    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.query_selector_all_from(self.root, selector)
    }

    pub fn query_selector_from(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|n| selector.matches(self, *n))
    }

    pub fn query_selector_all_from(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut cursor = Some(id).filter(|n| self.is_element(*n));
        while let Some(current) = cursor {
            if selector.matches(self, current) {
                return Some(current);
            }
            cursor = self.parent_element(current);
        }
        None
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|s| self.is_element(*s))
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|s| self.is_element(*s))
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self.tag_name(id).map(is_raw_text_tag).unwrap_or(false);
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize(*child, raw, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, false, &mut out);
        out
    }

    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    /// Replaces every child of `id` with the nodes parsed from `html`.
    /// On a parse error the element is left untouched. The old children stay
    /// readable through their ids but are no longer connected.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> Result<(), DomError> {
        if !self.is_element(id) {
            return Err(DomError::NotAnElement { index: id.0 });
        }
        let fragment = Document::parse(html)?;
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        for child in fragment.children(fragment.root).to_vec() {
            self.adopt(&fragment, child, id);
        }
        Ok(())
    }

    /// Parses `html` and appends the resulting nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, DomError> {
        if parent != self.root && !self.is_element(parent) {
            return Err(DomError::NotAnElement { index: parent.0 });
        }
        let fragment = Document::parse(html)?;
        let added = fragment
            .children(fragment.root)
            .to_vec()
            .into_iter()
            .map(|child| self.adopt(&fragment, child, parent))
            .collect();
        Ok(added)
    }

    fn adopt(&mut self, other: &Document, node: NodeId, parent: NodeId) -> NodeId {
        let kind = match other.node(node).map(|n| &n.kind) {
            Some(NodeKind::Element(e)) => NodeKind::Element(e.clone()),
            Some(NodeKind::Text(t)) => NodeKind::Text(t.clone()),
            _ => NodeKind::Text(String::new()),
        };
        let copy = self.push_node(parent, kind);
        for child in other.children(node) {
            self.adopt(other, *child, copy);
        }
        copy
    }

    fn serialize(&self, id: NodeId, raw_text: bool, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.serialize(*child, false, out);
                }
            }
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (k, v) in &element.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_into(v, true, out);
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(&element.tag) {
                    return;
                }
                let raw = is_raw_text_tag(&element.tag);
                for child in &node.children {
                    self.serialize(*child, raw, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

pub(crate) fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

fn escape_into(value: &str, attribute: bool, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in style.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                push_declaration(&style[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_declaration(&style[start..], &mut out);
    out
}

fn push_declaration(raw: &str, out: &mut Vec<(String, String)>) {
    let Some((name, value)) = raw.split_once(':') else {
        return;
    };
    let name = name.trim().to_ascii_lowercase();
    let value = value.trim();
    if name.is_empty() {
        return;
    }
    match out.iter_mut().find(|(n, _)| *n == name) {
        Some(existing) => existing.1 = value.to_string(),
        None => out.push((name, value.to_string())),
    }
}

fn serialize_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}
