//! Debounced mirror of a signal.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;

use super::read::Readable;
use super::runtime::{Listener, SignalId};
use super::state::Signal;
use super::subscription::{SubscribeMode, Subscription};
use crate::config;
use crate::scheduler::{self, TimerHandle};

/// A signal that follows `source` after a quiet period.
///
/// Every upstream value restarts the timer and replaces the pending value, so
/// a burst of writes delivers only its last value, `delay` after the burst
/// ends. Dropping the last handle cancels the timer and the upstream
/// subscription.
pub struct Deferred<T> {
    inner: Rc<DeferredInner<T>>,
}

struct DeferredInner<T> {
    output: Signal<T>,
    delay: Duration,
    timer: RefCell<Option<TimerHandle>>,
    upstream: RefCell<Option<Subscription>>,
}

/// Debounce `source` by `delay`.
pub fn defer<T, S>(source: &S, delay: Duration) -> Deferred<T>
where
    T: Clone + 'static,
    S: Readable<T> + ?Sized,
{
    let inner = Rc::new(DeferredInner {
        output: Signal::new(source.peek()),
        delay,
        timer: RefCell::new(None),
        upstream: RefCell::new(None),
    });

    let weak = Rc::downgrade(&inner);
    let upstream = source.subscribe_with(
        Rc::new(move |value: &T| {
            if let Some(inner) = weak.upgrade() {
                inner.schedule(value.clone());
            }
        }),
        SubscribeMode::Lazy,
    );
    *inner.upstream.borrow_mut() = Some(upstream);

    Deferred { inner }
}

/// Debounce `source` by the configured default delay.
pub fn defer_default<T, S>(source: &S) -> Deferred<T>
where
    T: Clone + 'static,
    S: Readable<T> + ?Sized,
{
    defer(source, config::current().default_defer)
}

impl<T: Clone + 'static> DeferredInner<T> {
    fn schedule(self: &Rc<Self>, value: T) {
        if let Some(previous) = self.timer.borrow_mut().take() {
            trace!(signal = ?self.output.id(), "deferred value superseded");
            previous.clear();
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        let handle = scheduler::set_timeout(self.delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.timer.borrow_mut().take();
                inner.output.set(value);
            }
        });
        *self.timer.borrow_mut() = Some(handle);
    }
}

impl<T> Drop for DeferredInner<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.clear();
        }
        if let Some(upstream) = self.upstream.get_mut().take() {
            upstream.unsubscribe();
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    pub fn get(&self) -> T {
        self.inner.output.get()
    }

    pub fn peek(&self) -> T {
        self.inner.output.peek()
    }

    /// Whether a value is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        (*self.inner.timer.borrow()).is_some_and(TimerHandle::is_pending)
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static, mode: SubscribeMode) -> Subscription {
        self.inner.output.subscribe(listener, mode)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Readable<T> for Deferred<T> {
    fn get(&self) -> T {
        Deferred::get(self)
    }

    fn peek(&self) -> T {
        Deferred::peek(self)
    }

    fn version(&self) -> u64 {
        self.inner.output.version()
    }

    fn id(&self) -> SignalId {
        self.inner.output.id()
    }

    fn subscribe_with(&self, listener: Listener<T>, mode: SubscribeMode) -> Subscription {
        self.inner.output.subscribe_with(listener, mode)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("delay", &self.inner.delay).finish()
    }
}
