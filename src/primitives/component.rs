//! Component - a root element plus its lifetime-scoped behavior.
//!
//! A component is a plain record, not a trait to inherit from: a root
//! element, the node its content renders into (the root itself or an
//! attached shadow root), and named slots that callers fill later.
//! Behavior is attached with lifecycle callbacks scoped to the root.
//!
//! ```ignore
//! fn counter(start: i32) -> Component {
//!     let count = signal(start);
//!     let component = Component::new("sp-counter");
//!     component.append(html!("<button onclick=" {on({
//!         let count = count.clone();
//!         move |_| count.update(|n| *n += 1)
//!     })} ">" {count.clone()} "</button>"));
//!     component.watch(&count, |n| tracing::info!(count = n, "counter changed"));
//!     component
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::dom::Node;
use crate::lifecycle::{self, IntoCleanup};
use crate::pipeline::{IntoValue, Render, Value, render_value};
use crate::signals::{Readable, SubscribeMode, untracked};

#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

struct ComponentInner {
    root: Node,
    content: Node,
    slots: RefCell<HashMap<String, Node>>,
}

impl Component {
    /// A component rooted at a new `<tag>` element.
    pub fn new(tag: &str) -> Self {
        Self::from_root(Node::element(tag))
    }

    /// A component over an existing element.
    pub fn from_root(root: Node) -> Self {
        Self {
            inner: Rc::new(ComponentInner {
                content: root.clone(),
                root,
                slots: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// A component whose content renders into a shadow root on `<tag>`.
    pub fn with_shadow(tag: &str) -> Self {
        let root = Node::element(tag);
        let content = match root.attach_shadow() {
            Some(shadow) => shadow,
            None => {
                warn!(tag, "element does not accept a shadow root; rendering into the element");
                root.clone()
            }
        };
        Self {
            inner: Rc::new(ComponentInner {
                root,
                content,
                slots: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn root(&self) -> &Node {
        &self.inner.root
    }

    /// Where content renders: the shadow root if there is one.
    pub fn content(&self) -> &Node {
        &self.inner.content
    }

    pub fn has_shadow(&self) -> bool {
        !self.inner.content.ptr_eq(&self.inner.root)
    }

    /// Render `content` and append it.
    pub fn append(&self, content: impl IntoValue) -> &Self {
        append_rendered(&self.inner.content, content.into_value());
        self
    }

    // =========================================================================
    // Slots
    // =========================================================================

    /// Register `node` as the slot called `name`.
    pub fn define_slot(&self, name: &str, node: &Node) -> &Self {
        self.inner.slots.borrow_mut().insert(name.to_string(), node.clone());
        self
    }

    /// The slot called `name`: a registered node, or else the first
    /// `<slot name="..">` element in the content.
    pub fn slot(&self, name: &str) -> Option<Node> {
        if let Some(node) = self.inner.slots.borrow().get(name) {
            return Some(node.clone());
        }
        self.inner
            .content
            .descendants(false)
            .into_iter()
            .find(|node| node.tag() == Some("slot") && node.attribute("name").as_deref() == Some(name))
    }

    /// Replace the children of slot `name` with `content`.
    ///
    /// Returns false when there is no such slot.
    pub fn fill(&self, name: &str, content: impl IntoValue) -> bool {
        let Some(slot) = self.slot(name) else {
            warn!(slot = name, "fill on a missing slot");
            return false;
        };
        slot.clear_children();
        append_rendered(&slot, content.into_value());
        true
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// See [`lifecycle::on_mount`]; scoped to the root.
    pub fn on_mount<C: IntoCleanup>(&self, callback: impl Fn() -> C + 'static) -> &Self {
        lifecycle::on_mount(&self.inner.root, callback);
        self
    }

    pub fn on_unmount(&self, callback: impl Fn() + 'static) -> &Self {
        lifecycle::on_unmount(&self.inner.root, callback);
        self
    }

    /// See [`lifecycle::effect`]; scoped to the root.
    pub fn effect(&self, f: impl Fn() + 'static) -> &Self {
        lifecycle::effect(&self.inner.root, f);
        self
    }

    /// Call `listener` with the current value on mount and on every change
    /// while mounted.
    pub fn watch<T: 'static, S>(&self, signal: &S, listener: impl Fn(&T) + 'static) -> &Self
    where
        S: Readable<T> + Clone + 'static,
    {
        let signal = signal.clone();
        let listener: Rc<dyn Fn(&T)> = Rc::new(listener);
        self.on_mount(move || signal.subscribe_with(listener.clone(), SubscribeMode::Immediate))
    }

    pub fn is_mounted(&self) -> bool {
        lifecycle::is_mounted(&self.inner.root)
    }
}

fn append_rendered(parent: &Node, value: Value) {
    let mut nodes = Vec::new();
    untracked(|| render_value(value, &mut nodes));
    for node in &nodes {
        parent.append_child(node);
    }
}

impl Render for Component {
    fn render(&self) -> Value {
        Value::Node(self.inner.root.clone())
    }
}

impl IntoValue for Component {
    fn into_value(self) -> Value {
        Value::Node(self.inner.root.clone())
    }
}

impl IntoValue for &Component {
    fn into_value(self) -> Value {
        Value::Node(self.inner.root.clone())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("root", &self.inner.root)
            .field("shadow", &self.has_shadow())
            .field("slots", &self.inner.slots.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::body;
    use crate::pipeline::html;
    use crate::signals::signal;
    use std::cell::Cell;

    #[test]
    fn test_component_renders_as_its_root() {
        let card = Component::new("sp-card");
        card.append("hello");
        let host = Node::element("div");
        crate::pipeline::mount(&host, &card);
        assert_eq!(host.inner_html(), "<sp-card>hello</sp-card>");
    }

    #[test]
    fn test_shadow_content_and_slots() {
        static T: [&str; 1] = ["<header><slot name=\"title\"></slot></header>"];
        let panel = Component::with_shadow("sp-panel");
        assert!(panel.has_shadow());
        panel.append(html(&T, vec![]));

        assert!(panel.fill("title", "Settings"));
        assert!(!panel.fill("missing", "x"));
        assert_eq!(
            panel.content().inner_html(),
            "<header><slot name=\"title\">Settings</slot></header>"
        );
        assert_eq!(panel.root().inner_html(), "", "light DOM stays empty");
    }

    #[test]
    fn test_watch_scoped_to_mount() {
        let count = signal(0);
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        let widget = Component::new("sp-widget");
        widget.watch(&count, move |n: &i32| seen_clone.set(*n));

        count.set(1);
        assert_eq!(seen.get(), 0, "not mounted yet");

        body().append_child(widget.root());
        assert_eq!(seen.get(), 1, "current value delivered on mount");
        count.set(2);
        assert_eq!(seen.get(), 2);

        widget.root().remove();
        count.set(3);
        assert_eq!(seen.get(), 2, "unsubscribed on unmount");
    }

    #[test]
    fn test_watch_derived_owned_values() {
        let name = signal("ada".to_string());
        let name_clone = name.clone();
        let greeting = crate::signals::derived(move || format!("hi {}", name_clone.get()));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let widget = Component::new("sp-greeter");
        widget.watch(&greeting.read_only(), move |text: &String| seen_clone.borrow_mut().push(text.clone()));

        body().append_child(widget.root());
        name.set("grace".into());
        assert_eq!(*seen.borrow(), vec!["hi ada", "hi grace"]);
        widget.root().remove();
    }

    #[test]
    fn test_lifecycle_hooks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (on_in, on_out) = (log.clone(), log.clone());
        let widget = Component::new("sp-widget");
        widget
            .on_mount(move || on_in.borrow_mut().push("mount"))
            .on_unmount(move || on_out.borrow_mut().push("unmount"));

        body().append_child(widget.root());
        widget.root().remove();
        assert_eq!(*log.borrow(), vec!["mount", "unmount"]);
        assert!(!widget.is_mounted());
    }
}
