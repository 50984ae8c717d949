//! Node handles and tree mutation.
//!
//! A [`Node`] is a reference-counted handle. Parents own their children;
//! children point back at their parent weakly. A shadow root is owned by its
//! host element and points back at it weakly.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use tracing::warn;

use super::event::{Event, EventListener, EventListenerId};
use super::observer::{self, Mutation};

// =============================================================================
// Types
// =============================================================================

/// Stable identity of a node for the lifetime of the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// What kind of node a handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
    Fragment,
    ShadowRoot,
}

enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: RefCell<Vec<(String, String)>>,
    },
    Text(RefCell<String>),
    Comment(RefCell<String>),
    /// Nodes the fragment held when last expanded.
    Fragment(RefCell<Vec<Weak<NodeData>>>),
    ShadowRoot,
}

pub(super) struct NodeData {
    id: NodeId,
    kind: NodeKind,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
    /// Shadow root -> host element.
    host: RefCell<Weak<NodeData>>,
    /// Element -> attached shadow root.
    shadow: RefCell<Option<Node>>,
    listeners: RefCell<Vec<(EventListenerId, String, EventListener)>>,
}

/// Handle to a DOM node. Cloning clones the handle.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

/// Non-owning handle to a DOM node.
#[derive(Clone)]
pub struct WeakNode(Weak<NodeData>);

thread_local! {
    static NEXT_NODE_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_node_id() -> NodeId {
    NEXT_NODE_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        NodeId(id)
    })
}

// =============================================================================
// Construction
// =============================================================================

impl Node {
    fn from_kind(kind: NodeKind) -> Self {
        Node(Rc::new(NodeData {
            id: next_node_id(),
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            host: RefCell::new(Weak::new()),
            shadow: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    /// Element with a lowercase tag name.
    pub fn element(tag: &str) -> Self {
        Self::from_kind(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: RefCell::new(Vec::new()),
        })
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Text(RefCell::new(data.into())))
    }

    pub fn comment(data: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Comment(RefCell::new(data.into())))
    }

    pub fn fragment() -> Self {
        Self::from_kind(NodeKind::Fragment(RefCell::new(Vec::new())))
    }

    pub(super) fn new_document() -> Self {
        Self::from_kind(NodeKind::Document)
    }
}

// =============================================================================
// Identity & Kind
// =============================================================================

impl Node {
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn node_type(&self) -> NodeType {
        match &self.0.kind {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment(_) => NodeType::Fragment,
            NodeKind::ShadowRoot => NodeType::ShadowRoot,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element { .. })
    }

    /// Tag name of an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn can_have_children(&self) -> bool {
        matches!(
            self.0.kind,
            NodeKind::Document | NodeKind::Element { .. } | NodeKind::Fragment(_) | NodeKind::ShadowRoot
        )
    }
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Document => write!(f, "#document"),
            NodeKind::Element { tag, .. } => write!(f, "<{tag}>#{}", self.0.id.0),
            NodeKind::Text(data) => write!(f, "#text({:?})", data.borrow()),
            NodeKind::Comment(data) => write!(f, "<!--{}-->", data.borrow()),
            NodeKind::Fragment(_) => write!(f, "#fragment#{}", self.0.id.0),
            NodeKind::ShadowRoot => write!(f, "#shadow-root#{}", self.0.id.0),
        }
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "Weak({node:?})"),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}

// =============================================================================
// Navigation
// =============================================================================

impl Node {
    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.children.borrow().get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.children.borrow().last().cloned()
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = parent.index_of(self)?;
        parent.child(index + 1)
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = parent.index_of(self)?;
        index.checked_sub(1).and_then(|i| parent.child(i))
    }

    /// Nodes a fragment stands for. A fragment with children records and
    /// returns them; once they have been moved out it keeps returning the
    /// recorded nodes that are still alive. Any other node stands for itself.
    pub fn fragment_nodes(&self) -> Vec<Node> {
        let NodeKind::Fragment(members) = &self.0.kind else {
            return vec![self.clone()];
        };
        let children = self.children();
        if !children.is_empty() {
            *members.borrow_mut() = children.iter().map(|child| Rc::downgrade(&child.0)).collect();
            return children;
        }
        members.borrow().iter().filter_map(Weak::upgrade).map(Node).collect()
    }

    fn index_of(&self, child: &Node) -> Option<usize> {
        self.0.children.borrow().iter().position(|c| c.ptr_eq(child))
    }

    /// Parent, or host element for a shadow root.
    pub(crate) fn composed_parent(&self) -> Option<Node> {
        match self.0.kind {
            NodeKind::ShadowRoot => self.host(),
            _ => self.parent(),
        }
    }

    /// Whether the node is attached, through parents and shadow hosts, to a
    /// document.
    pub fn is_connected(&self) -> bool {
        let mut current = self.clone();
        loop {
            if matches!(current.0.kind, NodeKind::Document) {
                return true;
            }
            match current.composed_parent() {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    /// Topmost ancestor, crossing shadow boundaries.
    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(next) = current.composed_parent() {
            current = next;
        }
        current
    }

    /// Whether `self` is `other` or one of its composed ancestors.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.composed_parent();
        }
        false
    }

    /// Pre-order traversal of the node and its descendants. Shadow trees are
    /// included after their host's own children when `composed` is set.
    pub fn descendants(&self, composed: bool) -> Vec<Node> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let children = node.children();
            let shadow = if composed { node.shadow_root() } else { None };
            if let Some(shadow) = shadow {
                stack.push(shadow);
            }
            stack.extend(children.into_iter().rev());
            out.push(node);
        }
        out
    }

    /// First descendant element (pre-order, excluding `self`) with `tag`.
    pub fn find_by_tag(&self, tag: &str) -> Option<Node> {
        self.descendants(false)
            .into_iter()
            .skip(1)
            .find(|n| n.tag() == Some(tag))
    }

    pub fn find_all_by_tag(&self, tag: &str) -> Vec<Node> {
        self.descendants(false)
            .into_iter()
            .skip(1)
            .filter(|n| n.tag() == Some(tag))
            .collect()
    }

    /// First descendant element whose attribute `name` equals `value`.
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<Node> {
        self.descendants(false)
            .into_iter()
            .skip(1)
            .find(|n| n.attribute(name).as_deref() == Some(value))
    }
}

// =============================================================================
// Mutation
// =============================================================================

impl Node {
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None`. A fragment inserts its children and is left empty. A child
    /// that already has a parent is moved.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if !self.can_have_children() {
            warn!(parent = ?self, "insert into a node that cannot have children");
            return;
        }
        if let Some(reference) = reference {
            if !reference.parent().is_some_and(|p| p.ptr_eq(self)) {
                warn!(parent = ?self, ?reference, "reference node is not a child");
                return;
            }
        }

        if matches!(child.0.kind, NodeKind::Fragment(_)) {
            for grandchild in child.children() {
                self.insert_one(&grandchild, reference);
            }
            return;
        }
        self.insert_one(child, reference);
    }

    fn insert_one(&self, child: &Node, reference: Option<&Node>) {
        if matches!(child.0.kind, NodeKind::Document | NodeKind::ShadowRoot) {
            warn!(?child, "documents and shadow roots cannot be inserted");
            return;
        }
        if child.contains(self) {
            warn!(parent = ?self, ?child, "insert would create a cycle");
            return;
        }
        if reference.is_some_and(|r| r.ptr_eq(child)) {
            return;
        }

        child.detach();

        let index = match reference {
            Some(reference) => match self.index_of(reference) {
                Some(index) => index,
                None => return,
            },
            None => self.child_count(),
        };
        self.0.children.borrow_mut().insert(index, child.clone());
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);

        if child.is_connected() {
            observer::notify(Mutation::Inserted(child));
        }
    }

    /// Detach from the parent. Does nothing for a parentless node.
    pub fn remove(&self) {
        self.detach();
    }

    fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        let was_connected = self.is_connected();
        parent.0.children.borrow_mut().retain(|c| !c.ptr_eq(self));
        *self.0.parent.borrow_mut() = Weak::new();
        if was_connected {
            observer::notify(Mutation::Removed(self));
        }
    }

    /// Replace this node with `nodes`, in order.
    pub fn replace_with(&self, nodes: &[Node]) {
        let Some(parent) = self.parent() else {
            warn!(node = ?self, "replace_with on a detached node");
            return;
        };
        for node in nodes {
            if !node.ptr_eq(self) {
                parent.insert_before(node, Some(self));
            }
        }
        if !nodes.iter().any(|n| n.ptr_eq(self)) {
            self.remove();
        }
    }

    /// Remove every child.
    pub fn clear_children(&self) {
        for child in self.children() {
            child.remove();
        }
    }

    /// Attach root-level nodes without firing mutation notifications.
    pub(super) fn append_silently(&self, child: &Node) {
        self.0.children.borrow_mut().push(child.clone());
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
    }
}

// =============================================================================
// Character Data & Attributes
// =============================================================================

impl Node {
    /// Data of a text or comment node; empty for other kinds.
    pub fn data(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => data.borrow().clone(),
            _ => String::new(),
        }
    }

    pub fn set_data(&self, value: impl Into<String>) {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => *data.borrow_mut() = value.into(),
            _ => warn!(node = ?self, "set_data on a node without character data"),
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => data.borrow().clone(),
            _ => self
                .descendants(false)
                .into_iter()
                .filter(|n| n.node_type() == NodeType::Text)
                .map(|n| n.data())
                .collect(),
        }
    }

    /// Replace the children with a single text node (or nothing for an
    /// empty string).
    pub fn set_text_content(&self, text: &str) {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => *data.borrow_mut() = text.to_string(),
            _ => {
                self.clear_children();
                if !text.is_empty() {
                    self.append_child(&Node::text(text));
                }
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.0.kind {
            NodeKind::Element { attributes, .. } => attributes
                .borrow()
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let NodeKind::Element { attributes, .. } = &self.0.kind else {
            warn!(node = ?self, name, "set_attribute on a non-element");
            return;
        };
        let name = name.to_ascii_lowercase();
        let mut attributes = attributes.borrow_mut();
        match attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name, value.to_string())),
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let NodeKind::Element { attributes, .. } = &self.0.kind {
            attributes.borrow_mut().retain(|(n, _)| n != name);
        }
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.0.kind {
            NodeKind::Element { attributes, .. } => attributes.borrow().clone(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Shadow Roots & Cloning
// =============================================================================

impl Node {
    /// Attach (or return the existing) shadow root of an element.
    pub fn attach_shadow(&self) -> Option<Node> {
        if !self.is_element() {
            warn!(node = ?self, "attach_shadow on a non-element");
            return None;
        }
        if let Some(existing) = self.shadow_root() {
            return Some(existing);
        }
        let shadow = Node::from_kind(NodeKind::ShadowRoot);
        *shadow.0.host.borrow_mut() = Rc::downgrade(&self.0);
        *self.0.shadow.borrow_mut() = Some(shadow.clone());
        Some(shadow)
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.0.shadow.borrow().clone()
    }

    /// Host element of a shadow root.
    pub fn host(&self) -> Option<Node> {
        self.0.host.borrow().upgrade().map(Node)
    }

    /// Copy the node; with `deep`, its descendants too. Listeners and shadow
    /// roots are not copied.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = match &self.0.kind {
            NodeKind::Document => Node::new_document(),
            NodeKind::Element { tag, attributes } => Node::from_kind(NodeKind::Element {
                tag: tag.clone(),
                attributes: RefCell::new(attributes.borrow().clone()),
            }),
            NodeKind::Text(data) => Node::text(data.borrow().clone()),
            NodeKind::Comment(data) => Node::comment(data.borrow().clone()),
            NodeKind::Fragment(_) => Node::fragment(),
            NodeKind::ShadowRoot => Node::from_kind(NodeKind::ShadowRoot),
        };
        if deep {
            for child in self.0.children.borrow().iter() {
                copy.append_silently(&child.clone_node(true));
            }
        }
        copy
    }
}

// =============================================================================
// Events
// =============================================================================

impl Node {
    pub fn add_event_listener(&self, kind: &str, listener: impl Fn(&Event) + 'static) -> EventListenerId {
        let id = EventListenerId::next();
        self.0
            .listeners
            .borrow_mut()
            .push((id, kind.to_string(), Rc::new(listener)));
        id
    }

    pub fn remove_event_listener(&self, id: EventListenerId) {
        self.0.listeners.borrow_mut().retain(|(entry, _, _)| *entry != id);
    }

    pub(super) fn listeners_for(&self, kind: &str) -> Vec<(EventListenerId, EventListener)> {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| k == kind)
            .map(|(id, _, listener)| (*id, listener.clone()))
            .collect()
    }

    pub(super) fn has_listener(&self, id: EventListenerId) -> bool {
        self.0.listeners.borrow().iter().any(|(entry, _, _)| *entry == id)
    }
}
