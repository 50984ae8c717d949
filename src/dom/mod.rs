//! In-memory DOM.
//!
//! A single-threaded node tree with elements, text, comments, fragments and
//! shadow roots, plus events and an HTML serializer. Each thread owns one
//! live [`document`]; a node is *connected* when it is attached to it,
//! directly or through shadow hosts.

mod event;
mod node;
mod observer;
mod serialize;

pub use event::{Event, EventListener, EventListenerId};
pub use node::{Node, NodeId, NodeType, WeakNode};
pub use observer::Mutation;
pub use serialize::{VOID_ELEMENTS, is_void_element};

pub(crate) use observer::set_observer;

struct LiveDocument {
    document: Node,
    body: Node,
}

thread_local! {
    static DOCUMENT: LiveDocument = {
        let document = Node::new_document();
        let html = Node::element("html");
        let head = Node::element("head");
        let body = Node::element("body");
        document.append_silently(&html);
        html.append_silently(&head);
        html.append_silently(&body);
        LiveDocument { document, body }
    };
}

/// The thread's live document.
pub fn document() -> Node {
    DOCUMENT.with(|live| live.document.clone())
}

/// The `<body>` of the live document.
pub fn body() -> Node {
    DOCUMENT.with(|live| live.body.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_body_is_connected() {
        assert!(body().is_connected());
        assert_eq!(body().root(), document());
        assert!(!Node::element("div").is_connected());
    }

    #[test]
    fn test_observer_sees_connected_changes_only() {
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        // The lifecycle tracker may already own the slot on this thread.
        let installed = set_observer(move |mutation| {
            let entry = match mutation {
                Mutation::Inserted(node) => format!("+{:?}", node.tag()),
                Mutation::Removed(node) => format!("-{:?}", node.tag()),
            };
            log_clone.borrow_mut().push(entry);
        });
        if !installed {
            return;
        }

        let detached = Node::element("section");
        let child = Node::element("p");
        detached.append_child(&child);
        assert!(log.borrow().is_empty(), "detached trees are not observed");

        body().append_child(&detached);
        detached.remove();
        assert_eq!(*log.borrow(), vec!["+Some(\"section\")", "-Some(\"section\")"]);
    }
}
