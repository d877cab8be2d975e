//! Storefront page model
//!
//! An arena-backed element tree standing in for the live page. The engine
//! rewrites prices through this model instead of through markup strings:
//! captured originals are detached subtrees and every re-render starts from
//! a fresh clone of them, so repeated passes cannot accumulate drift.
//!
//! Serialization is normalized (attributes in name order, text verbatim);
//! two structurally equal trees always serialize to identical bytes.

pub mod parse;

use std::collections::BTreeMap;

pub use parse::{parse_document, parse_fragment};

/// Index into the document arena. Ids are never reused; nodes detached by a
/// rewrite simply stay unreferenced for the page lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub classes: Vec<String>,
    /// Attributes other than `class`, kept sorted for stable serialization.
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Elements serialized without a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A simple selector over the fixed sets the engine scopes itself to:
/// one or more required classes, or the presence of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Classes(Vec<String>),
    Attr(String),
}

impl Selector {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        if let Some(attr) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if attr.is_empty() {
                anyhow::bail!("Empty attribute selector: '{input}'");
            }
            return Ok(Selector::Attr(attr.to_string()));
        }
        if input.starts_with('.') {
            let classes: Vec<String> = input
                .split('.')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if classes.is_empty() {
                anyhow::bail!("Empty class selector: '{input}'");
            }
            return Ok(Selector::Classes(classes));
        }
        anyhow::bail!("Unsupported selector: '{input}'")
    }

    pub fn matches(&self, element: &ElementData) -> bool {
        match self {
            Selector::Classes(classes) => classes
                .iter()
                .all(|c| element.classes.iter().any(|ec| ec == c)),
            Selector::Attr(name) => element.attrs.contains_key(name),
        }
    }
}

type Observer = Box<dyn Fn() + Send + Sync>;

/// One storefront page: a body subtree plus the location path the page was
/// served under.
pub struct Document {
    nodes: Vec<NodeData>,
    body: NodeId,
    path: String,
    observers: Vec<Observer>,
}

impl Document {
    pub fn new() -> Self {
        let body = NodeData {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(ElementData {
                tag: "body".to_string(),
                classes: Vec::new(),
                attrs: BTreeMap::new(),
            }),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            path: "/".to_string(),
            observers: Vec::new(),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
    }

    /// Register a structural-mutation observer. Observers fire on host
    /// content changes (insert/remove under the body); engine rewrites go
    /// through [`Document::replace_children`] and stay invisible to them.
    pub fn observe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer();
        }
    }

    // -- construction ------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        if self.is_attached(parent) {
            self.notify();
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.nodes[child.0].parent = None;
        if self.is_attached(parent) {
            self.notify();
        }
    }

    /// Swap an element's children wholesale. This is the engine's rewrite
    /// primitive; it does not fire observers, so conversion passes never
    /// retrigger themselves through the watcher.
    pub fn replace_children(&mut self, parent: NodeId, new_children: Vec<NodeId>) {
        let old = std::mem::take(&mut self.nodes[parent.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        for &child in &new_children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0].children = new_children;
    }

    /// Deep copy of a subtree; the copy starts detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let children = self.nodes[id.0].children.clone();
        let copy = self.push(kind);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    /// Detached deep copies of an element's current children.
    pub fn clone_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = self.nodes[id.0].children.clone();
        children
            .into_iter()
            .map(|child| self.clone_subtree(child))
            .collect()
    }

    // -- attributes and classes --------------------------------------------

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            if !el.classes.iter().any(|c| c == class) {
                el.classes.push(class.to_string());
            }
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.classes.iter().any(|c| c == class))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.remove(name);
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attrs.get(name).map(String::as_str))
    }

    // -- queries -----------------------------------------------------------

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Whether the node is still reachable from the body.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.body {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// All elements under the body in document order, body excluded.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendant_elements(self.body)
    }

    /// Descendant elements of `root` in document order, `root` excluded.
    pub fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.element(id).is_some() {
                out.push(id);
            }
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Nearest ancestor-or-self matching any of the selectors.
    pub fn closest(&self, id: NodeId, selectors: &[Selector]) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(el) = self.element(node) {
                if selectors.iter().any(|s| s.matches(el)) {
                    return Some(node);
                }
            }
            current = self.nodes[node.0].parent;
        }
        None
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    // -- serialization -----------------------------------------------------

    /// The page body's inner markup.
    pub fn to_html(&self) -> String {
        self.inner_html(self.body)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[id.0].children {
            self.write_node(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                if !el.classes.is_empty() {
                    out.push_str(" class=\"");
                    out.push_str(&el.classes.join(" "));
                    out.push('"');
                }
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(value);
                    out.push('"');
                }
                out.push('>');
                let children = &self.nodes[id.0].children;
                if children.is_empty() && VOID_TAGS.contains(&el.tag.as_str()) {
                    return;
                }
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
