//! The document's single mutation hook.
//!
//! Insertions are reported when the inserted node ends up connected;
//! removals when the removed node was connected. Notification is synchronous,
//! after the tree has been updated.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::node::Node;

/// A change to the connected tree.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    /// Root of a subtree that became connected.
    Inserted(&'a Node),
    /// Root of a subtree that was disconnected.
    Removed(&'a Node),
}

type Observer = Rc<dyn Fn(Mutation<'_>)>;

thread_local! {
    static OBSERVER: RefCell<Option<Observer>> = const { RefCell::new(None) };
}

/// Install the mutation observer. Only the first call has any effect;
/// returns whether this call installed it.
pub(crate) fn set_observer(observer: impl Fn(Mutation<'_>) + 'static) -> bool {
    OBSERVER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return false;
        }
        debug!("mutation observer installed");
        *slot = Some(Rc::new(observer));
        true
    })
}

pub(super) fn notify(mutation: Mutation<'_>) {
    let observer = OBSERVER.with(|slot| slot.borrow().clone());
    if let Some(observer) = observer {
        observer(mutation);
    }
}
