//! Events and bubbling dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::node::Node;

pub type EventListener = Rc<dyn Fn(&Event)>;

/// Handle returned by [`Node::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventListenerId(u64);

thread_local! {
    static NEXT_LISTENER: Cell<u64> = const { Cell::new(1) };
}

impl EventListenerId {
    pub(super) fn next() -> Self {
        NEXT_LISTENER.with(|next| {
            let id = next.get();
            next.set(id + 1);
            EventListenerId(id)
        })
    }
}

/// A dispatched event. Bubbles from the target through its ancestors,
/// crossing shadow boundaries, until propagation is stopped.
pub struct Event {
    kind: String,
    detail: Option<String>,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// Attach a payload, e.g. the new value of an `input` event.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    pub fn current_target(&self) -> Option<Node> {
        self.current_target.borrow().clone()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("detail", &self.detail)
            .field("target", &self.target.borrow())
            .finish()
    }
}

impl Node {
    /// Dispatch `event` at this node. Returns `false` if a listener called
    /// [`Event::prevent_default`].
    pub fn dispatch_event(&self, event: &Event) -> bool {
        *event.target.borrow_mut() = Some(self.clone());

        let mut current = Some(self.clone());
        while let Some(node) = current {
            *event.current_target.borrow_mut() = Some(node.clone());
            for (id, listener) in node.listeners_for(&event.kind) {
                if node.has_listener(id) {
                    listener(event);
                }
            }
            if event.propagation_stopped.get() {
                trace!(kind = %event.kind, at = ?node, "propagation stopped");
                break;
            }
            current = node.composed_parent();
        }

        *event.current_target.borrow_mut() = None;
        !event.default_prevented()
    }
}
