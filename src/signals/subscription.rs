//! Subscriptions - revocable listener registrations.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::{ListenerId, Source};

/// When a new subscriber first hears from its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscribeMode {
    /// Deliver the current value synchronously, before `subscribe` returns.
    Immediate,
    /// Deliver only values written after subscribing.
    #[default]
    Lazy,
}

/// Handle to one listener registered on a signal.
///
/// Holds the signal alive until [`unsubscribe`](Self::unsubscribe) is
/// called. Dropping the handle does not unsubscribe; clones share the same
/// registration.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

struct SubscriptionInner {
    listener: ListenerId,
    source: RefCell<Option<Rc<dyn Source>>>,
}

impl Subscription {
    pub(crate) fn new(source: Rc<dyn Source>, listener: ListenerId) -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                listener,
                source: RefCell::new(Some(source)),
            }),
        }
    }

    /// Remove the listener. Idempotent.
    pub fn unsubscribe(&self) {
        let source = self.inner.source.borrow_mut().take();
        if let Some(source) = source {
            source.remove_listener(self.inner.listener);
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.inner.source.borrow().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("listener", &self.inner.listener)
            .field("active", &self.is_active())
            .finish()
    }
}
