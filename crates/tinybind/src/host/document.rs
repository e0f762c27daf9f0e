//! An in-memory document tree.

use alloc::{format, string::String, vec::Vec};
use indexmap::IndexMap;
use log::trace;

use super::event::EventTarget;
use super::selector::Selector;
use crate::closure::HostClosure;
use crate::HostError;

/// Identifies a node of a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element { tag: String, attributes: IndexMap<String, String> },
    Text(String),
}

#[derive(Debug, Clone)]
struct Listener {
    event_type: String,
    callback: HostClosure,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<Listener>,
}

/// A document with `<html>`, `<head>` and `<body>`
///
/// Nodes are never freed; removing a node only detaches it.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    html: NodeId,
    body: NodeId,
    title: String,
    window_listeners: Vec<Listener>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            html: NodeId(0),
            body: NodeId(0),
            title: String::new(),
            window_listeners: Vec::new(),
        };

        let root = doc.push(NodeKind::Document);
        let html = doc.element("html");
        let head = doc.element("head");
        let body = doc.element("body");
        doc.attach(root, html, None);
        doc.attach(html, head, None);
        doc.attach(html, body, None);
        doc.html = html;
        doc.body = body;
        doc
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { kind, parent: None, children: Vec::new(), listeners: Vec::new() });
        id
    }

    fn element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element { tag: tag.into(), attributes: IndexMap::new() })
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }

    /// Whether the id belongs to this document
    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.get(id.0 as usize).is_some()
    }

    /// The id itself, if it belongs to this document
    ///
    /// Accessors taking a [`NodeId`] panic on ids from another document;
    /// ids that come from outside the page go through here first.
    pub fn check(&self, id: NodeId) -> Result<NodeId, HostError> {
        match self.exists(id) {
            true => Ok(id),
            false => Err(HostError::not_found(format!("node {} is not part of this document", id.0))),
        }
    }

    /// The document node itself
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `<html>` element
    pub fn document_element(&self) -> NodeId {
        self.html
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> Result<NodeId, HostError> {
        validate_name(tag)?;
        Ok(self.element(&tag.to_ascii_lowercase()))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// The lowercase tag name, `None` for non-elements
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag_name(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is attached to the document
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root(), id)
    }

    /// Append `child` to `parent`, moving it if it is attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, HostError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference`, or at the end without one
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<NodeId, HostError> {
        if matches!(self.node(parent).kind, NodeKind::Text(_)) {
            return Err(HostError::hierarchy_request("text nodes cannot have children"));
        }

        if matches!(self.node(child).kind, NodeKind::Document) || self.contains(child, parent) {
            return Err(HostError::hierarchy_request("the new child contains the parent"));
        }

        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(HostError::not_found("the reference node is not a child of this node"));
            }
        }

        // inserting a node before itself leaves the tree unchanged
        if reference == Some(child) {
            return Ok(child);
        }

        self.detach(child);
        self.attach(parent, child, reference);
        Ok(child)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let children = &mut self.node_mut(parent).children;
        let at = reference.and_then(|r| children.iter().position(|c| *c == r)).unwrap_or(children.len());
        children.insert(at, child);
        self.node_mut(child).parent = Some(parent);
        trace!("attached node {} to {}", child.0, parent.0);
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.node_mut(child).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != child);
        }
    }

    /// Detach a node from its parent
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes.get(&name.to_ascii_lowercase()).map(String::as_str),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        validate_name(name)?;
        match &mut self.node_mut(id).kind {
            NodeKind::Element { attributes, .. } => {
                attributes.insert(name.to_ascii_lowercase(), value.into());
                Ok(())
            }
            _ => Err(HostError::type_error("setAttribute called on a non-element")),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            attributes.shift_remove(&name.to_ascii_lowercase());
        }
    }

    /// The `id` attribute, empty if unset
    pub fn id(&self, id: NodeId) -> &str {
        self.get_attribute(id, "id").unwrap_or_default()
    }

    /// Concatenated text of all descendant text nodes, `None` for the document
    pub fn text_content(&self, id: NodeId) -> Option<String> {
        match &self.node(id).kind {
            NodeKind::Document => None,
            NodeKind::Text(text) => Some(text.clone()),
            NodeKind::Element { .. } => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    if let NodeKind::Text(text) = &self.node(node).kind {
                        out.push_str(text);
                    }
                }
                Some(out)
            }
        }
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: Option<&str>) {
        let text = text.unwrap_or_default();
        match &mut self.node_mut(id).kind {
            NodeKind::Document => return,
            NodeKind::Text(current) => {
                *current = text.into();
                return;
            }
            NodeKind::Element { .. } => {}
        }

        for child in core::mem::take(&mut self.node_mut(id).children) {
            self.node_mut(child).parent = None;
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.attach(id, node, None);
        }
    }

    /// The tokens of the `class` attribute
    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.get_attribute(id, "class").map(|class| class.split_ascii_whitespace().collect()).unwrap_or_default()
    }

    pub fn class_contains(&self, id: NodeId, token: &str) -> bool {
        self.classes(id).contains(&token)
    }

    pub fn class_add(&mut self, id: NodeId, token: &str) -> Result<(), HostError> {
        validate_token(token)?;
        if !self.class_contains(id, token) {
            let mut classes: Vec<String> = self.classes(id).into_iter().map(String::from).collect();
            classes.push(token.into());
            self.set_attribute(id, "class", &classes.join(" "))?;
        }
        Ok(())
    }

    pub fn class_remove(&mut self, id: NodeId, token: &str) -> Result<(), HostError> {
        validate_token(token)?;
        if self.class_contains(id, token) {
            let classes: Vec<String> =
                self.classes(id).into_iter().filter(|class| *class != token).map(String::from).collect();
            self.set_attribute(id, "class", &classes.join(" "))?;
        }
        Ok(())
    }

    /// Toggle a class, returning whether it is now present
    pub fn class_toggle(&mut self, id: NodeId, token: &str) -> Result<bool, HostError> {
        if self.class_contains(id, token) {
            self.class_remove(id, token)?;
            Ok(false)
        } else {
            self.class_add(id, token)?;
            Ok(true)
        }
    }

    /// All nodes below `scope` in tree order, excluding `scope`
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, HostError> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants(scope).into_iter().find(|node| selector.matches(self, *node)))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, HostError> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants(scope).into_iter().filter(|node| selector.matches(self, *node)).collect())
    }

    /// The first attached element with the given id
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root()).into_iter().find(|node| self.get_attribute(*node, "id") == Some(id))
    }

    /// The node or its nearest ancestor matching the selector
    pub fn closest(&self, id: NodeId, selector: &str) -> Result<Option<NodeId>, HostError> {
        let selector = Selector::parse(selector)?;
        let mut current = Some(id);
        while let Some(node) = current {
            if selector.matches(self, node) {
                return Ok(Some(node));
            }
            current = self.parent(node);
        }
        Ok(None)
    }

    /// Register a listener; registering the same callback twice has no effect
    pub fn add_event_listener(&mut self, target: EventTarget, event_type: &str, callback: HostClosure) {
        let listeners = match target {
            EventTarget::Window => &mut self.window_listeners,
            EventTarget::Node(id) => &mut self.node_mut(id).listeners,
        };

        if listeners.iter().any(|l| l.event_type == event_type && l.callback.ptr_eq(&callback)) {
            return;
        }
        listeners.push(Listener { event_type: event_type.into(), callback });
    }

    pub fn listener_count(&self, target: EventTarget) -> usize {
        match target {
            EventTarget::Window => self.window_listeners.len(),
            EventTarget::Node(id) => self.node(id).listeners.len(),
        }
    }

    /// The listeners an event reaches while bubbling from `target` to the window
    pub fn event_path(&self, target: EventTarget, event_type: &str) -> Vec<HostClosure> {
        let mut path = Vec::new();
        let matching = |listeners: &[Listener], path: &mut Vec<HostClosure>| {
            path.extend(listeners.iter().filter(|l| l.event_type == event_type).map(|l| l.callback.clone()));
        };

        if let EventTarget::Node(id) = target {
            let mut current = Some(id);
            while let Some(node) = current {
                matching(&self.node(node).listeners, &mut path);
                current = self.parent(node);
            }

            if !self.is_connected(id) {
                return path;
            }
        }

        matching(&self.window_listeners, &mut path);
        path
    }

    /// Serialize a node and its descendants
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Document => {
                out.push_str("<!DOCTYPE html>");
                for child in self.children(id) {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value, true)));
                }
                out.push('>');
                for child in self.children(id) {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn validate_name(name: &str) -> Result<(), HostError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));

    match valid {
        true => Ok(()),
        false => Err(HostError::invalid_character(format!("'{name}' is not a valid name"))),
    }
}

fn validate_token(token: &str) -> Result<(), HostError> {
    if token.is_empty() {
        return Err(HostError::syntax("the token must not be empty"));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(HostError::invalid_character(format!("the token '{token}' contains whitespace")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_skeleton() {
        let doc = Document::new();
        assert_eq!(doc.tag_name(doc.document_element()), Some("html"));
        assert_eq!(doc.parent(doc.body()), Some(doc.document_element()));
        assert_eq!(doc.outer_html(doc.root()), "<!DOCTYPE html><html><head></head><body></body></html>");
    }

    #[test]
    fn insert_before_and_move() -> Result<(), HostError> {
        let mut doc = Document::new();
        let body = doc.body();
        let (a, b, c) = (doc.create_element("a")?, doc.create_element("B")?, doc.create_element("c")?);
        doc.append_child(body, a)?;
        doc.append_child(body, c)?;
        doc.insert_before(body, b, Some(c))?;
        assert_eq!(doc.children(body), &[a, b, c]);

        doc.append_child(a, c)?;
        assert_eq!(doc.children(body), &[a, b]);
        assert_eq!(doc.parent(c), Some(a));
        assert_eq!(doc.tag_name(b), Some("b"));
        Ok(())
    }

    #[test]
    fn hierarchy_errors() -> Result<(), HostError> {
        let mut doc = Document::new();
        let body = doc.body();
        let div = doc.create_element("div")?;
        doc.append_child(body, div)?;

        assert_eq!(doc.append_child(div, body).unwrap_err().name(), "HierarchyRequestError");
        assert_eq!(doc.append_child(div, div).unwrap_err().name(), "HierarchyRequestError");

        let stray = doc.create_element("p")?;
        assert_eq!(doc.insert_before(body, div, Some(stray)).unwrap_err().name(), "NotFoundError");
        assert_eq!(doc.create_element("1up").unwrap_err().name(), "InvalidCharacterError");
        Ok(())
    }

    #[test]
    fn text_content_replaces_children() -> Result<(), HostError> {
        let mut doc = Document::new();
        let p = doc.create_element("p")?;
        let span = doc.create_element("span")?;
        doc.append_child(p, span)?;
        doc.set_text_content(span, Some("inner"));
        assert_eq!(doc.text_content(p).as_deref(), Some("inner"));

        doc.set_text_content(p, Some("a < b"));
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.parent(span), None);
        assert_eq!(doc.outer_html(p), "<p>a &lt; b</p>");

        doc.set_text_content(p, None);
        assert!(doc.children(p).is_empty());
        assert_eq!(doc.text_content(doc.root()), None);
        Ok(())
    }

    #[test]
    fn class_list_operations() -> Result<(), HostError> {
        let mut doc = Document::new();
        let div = doc.create_element("div")?;
        doc.class_add(div, "a")?;
        doc.class_add(div, "b")?;
        doc.class_add(div, "a")?;
        assert_eq!(doc.get_attribute(div, "class"), Some("a b"));

        assert!(!doc.class_toggle(div, "a")?);
        assert!(doc.class_toggle(div, "c")?);
        assert_eq!(doc.classes(div), ["b", "c"]);

        assert_eq!(doc.class_add(div, "").unwrap_err().name(), "SyntaxError");
        assert_eq!(doc.class_remove(div, "x y").unwrap_err().name(), "InvalidCharacterError");
        Ok(())
    }

    #[test]
    fn queries() -> Result<(), HostError> {
        let mut doc = Document::new();
        let body = doc.body();
        let list = doc.create_element("ul")?;
        doc.set_attribute(list, "id", "list")?;
        doc.append_child(body, list)?;
        let items: Vec<NodeId> = (0..3).map(|_| doc.create_element("li")).collect::<Result<_, _>>()?;
        for item in &items {
            doc.append_child(list, *item)?;
        }
        doc.class_add(items[1], "selected")?;

        assert_eq!(doc.get_element_by_id("list"), Some(list));
        assert_eq!(doc.query_selector(doc.root(), "li.selected")?, Some(items[1]));
        assert_eq!(doc.query_selector_all(list, "li")?, items);
        assert_eq!(doc.closest(items[2], "#list")?, Some(list));
        assert_eq!(doc.closest(items[2], "table")?, None);
        assert_eq!(doc.query_selector(body, "li[").unwrap_err().name(), "SyntaxError");

        doc.remove(list);
        assert_eq!(doc.get_element_by_id("list"), None);
        Ok(())
    }
}
