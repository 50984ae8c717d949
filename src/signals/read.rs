//! The shared read surface of state and derived signals.

use std::fmt;
use std::rc::Rc;

use super::runtime::{Listener, SignalId};
use super::subscription::{SubscribeMode, Subscription};

/// Read and subscribe operations common to every signal kind.
///
/// Object safe, so any readable signal can be erased into a [`ReadSignal`].
pub trait Readable<T> {
    /// Current value; records a dependency when called inside a derived
    /// computation.
    fn get(&self) -> T;

    /// Current value without recording a dependency.
    fn peek(&self) -> T;

    /// Bumped every time the signal delivers a value.
    fn version(&self) -> u64;

    fn id(&self) -> SignalId;

    fn subscribe_with(&self, listener: Listener<T>, mode: SubscribeMode) -> Subscription;
}

/// Register `listener` on `signal`.
///
/// With [`SubscribeMode::Immediate`] the current value is delivered before
/// this returns.
pub fn subscribe<T, S>(signal: &S, listener: impl Fn(&T) + 'static, mode: SubscribeMode) -> Subscription
where
    S: Readable<T> + ?Sized,
{
    signal.subscribe_with(Rc::new(listener), mode)
}

/// Type-erased read-only signal.
pub struct ReadSignal<T> {
    inner: Rc<dyn Readable<T>>,
}

impl<T> ReadSignal<T> {
    pub fn new(signal: impl Readable<T> + 'static) -> Self {
        Self {
            inner: Rc::new(signal),
        }
    }

    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn peek(&self) -> T {
        self.inner.peek()
    }

    /// Subscribe with a plain closure.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static, mode: SubscribeMode) -> Subscription {
        self.inner.subscribe_with(Rc::new(listener), mode)
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Readable<T> for ReadSignal<T> {
    fn get(&self) -> T {
        self.inner.get()
    }

    fn peek(&self) -> T {
        self.inner.peek()
    }

    fn version(&self) -> u64 {
        self.inner.version()
    }

    fn id(&self) -> SignalId {
        self.inner.id()
    }

    fn subscribe_with(&self, listener: Listener<T>, mode: SubscribeMode) -> Subscription {
        self.inner.subscribe_with(listener, mode)
    }
}

impl<T> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal").field("id", &self.inner.id()).finish()
    }
}
