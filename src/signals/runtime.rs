//! Signal runtime - identities, the tracking-frame stack and listener dispatch.
//!
//! Dependency tracking is an explicit stack of frames held in a thread-local
//! slot. A derived computation pushes a recording frame, every signal read
//! while that frame is on top registers itself in it, and the frame is popped
//! when the computation returns (or unwinds). `untracked` pushes an empty
//! frame that swallows reads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{error, trace};

use crate::config;

// =============================================================================
// Identity
// =============================================================================

/// Monotonic identity of a signal (state or derived).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl fmt::Debug for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Identity of one listener entry inside a signal's subscriber list.
pub(crate) type ListenerId = u64;

/// A value listener.
pub type Listener<T> = Rc<dyn Fn(&T)>;

thread_local! {
    static NEXT_SIGNAL_ID: Cell<u64> = const { Cell::new(1) };
    static NEXT_LISTENER_ID: Cell<u64> = const { Cell::new(1) };

    /// `Some` = recording frame, `None` = untracked frame.
    static TRACKING: RefCell<Vec<Option<Frame>>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn next_signal_id() -> SignalId {
    NEXT_SIGNAL_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        SignalId(id)
    })
}

fn next_listener_id() -> ListenerId {
    NEXT_LISTENER_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    })
}

// =============================================================================
// Sources
// =============================================================================

/// Anything a derived computation can depend on.
pub(crate) trait Source {
    fn source_id(&self) -> SignalId;

    /// Register a change callback that ignores the delivered value.
    fn add_dependent(&self, on_change: Rc<dyn Fn()>) -> ListenerId;

    /// Remove a listener or dependent by id. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

// =============================================================================
// Tracking Frames
// =============================================================================

#[derive(Default)]
pub(crate) struct Frame {
    sources: Vec<Rc<dyn Source>>,
}

impl Frame {
    pub(crate) fn into_sources(self) -> Vec<Rc<dyn Source>> {
        self.sources
    }
}

/// Pops its frame on drop so a panicking computation leaves the stack intact.
struct FrameGuard {
    popped: bool,
}

impl FrameGuard {
    fn push(frame: Option<Frame>) -> Self {
        TRACKING.with(|stack| stack.borrow_mut().push(frame));
        Self { popped: false }
    }

    fn finish(mut self) -> Option<Frame> {
        self.popped = true;
        TRACKING.with(|stack| stack.borrow_mut().pop().flatten())
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.popped {
            TRACKING.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// Register a read of `source` in the active recording frame, if any.
///
/// The source is only materialized when a recording frame is active.
pub(crate) fn track(source: impl FnOnce() -> Rc<dyn Source>) {
    TRACKING.with(|stack| {
        let mut stack = stack.borrow_mut();
        let Some(Some(frame)) = stack.last_mut() else {
            return;
        };
        let source = source();
        let id = source.source_id();
        if !frame.sources.iter().any(|s| s.source_id() == id) {
            frame.sources.push(source);
        }
    });
}

/// Run `f` inside a fresh recording frame, returning its result and every
/// source read during the call (deduplicated, in first-read order).
pub(crate) fn record<R>(f: impl FnOnce() -> R) -> (R, Vec<Rc<dyn Source>>) {
    let guard = FrameGuard::push(Some(Frame::default()));
    let result = f();
    let sources = guard.finish().map(Frame::into_sources).unwrap_or_default();
    (result, sources)
}

/// Run `f` without recording any dependencies.
///
/// Reads inside `f` do not subscribe the enclosing derived computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = FrameGuard::push(None);
    f()
}

/// Whether a recording frame is currently active.
pub fn is_tracking() -> bool {
    TRACKING.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
}

// =============================================================================
// Listener Lists
// =============================================================================

/// Ordered subscriber list of one signal.
pub(crate) struct Listeners<T> {
    entries: RefCell<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn add(&self, listener: Listener<T>) -> ListenerId {
        let id = next_listener_id();
        self.entries.borrow_mut().push((id, listener));
        id
    }

    pub(crate) fn add_dependent(&self, on_change: Rc<dyn Fn()>) -> ListenerId {
        self.add(Rc::new(move |_: &T| on_change()))
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Deliver `value` to a snapshot of the current listeners.
    ///
    /// Listeners removed during the pass are skipped. Listeners added during
    /// the pass wait for the next one. Nested writes dispatch depth-first.
    pub(crate) fn dispatch(&self, value: &T, origin: SignalId) {
        let snapshot: Vec<(ListenerId, Listener<T>)> = self.entries.borrow().clone();
        trace!(signal = ?origin, listeners = snapshot.len(), "dispatch");
        untracked(|| {
            for (id, listener) in snapshot {
                if !self.contains(id) {
                    continue;
                }
                invoke_listener(&listener, value, origin);
            }
        });
    }
}

/// Call one listener, isolating panics when configured to.
pub(crate) fn invoke_listener<T>(listener: &Listener<T>, value: &T, origin: SignalId) {
    if !config::isolate_listener_panics() {
        listener(value);
        return;
    }
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
        error!(
            signal = ?origin,
            "listener panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(SignalId);

    impl Source for Dummy {
        fn source_id(&self) -> SignalId {
            self.0
        }
        fn add_dependent(&self, _: Rc<dyn Fn()>) -> ListenerId {
            0
        }
        fn remove_listener(&self, _: ListenerId) {}
    }

    #[test]
    fn test_record_collects_unique_sources() {
        let a = next_signal_id();
        let b = next_signal_id();

        let ((), sources) = record(|| {
            track(|| Rc::new(Dummy(a)));
            track(|| Rc::new(Dummy(b)));
            track(|| Rc::new(Dummy(a)));
        });

        let ids: Vec<SignalId> = sources.iter().map(|s| s.source_id()).collect();
        assert_eq!(ids, vec![a, b], "sources should be deduplicated in read order");
    }

    #[test]
    fn test_untracked_hides_reads() {
        let a = next_signal_id();
        let ((), sources) = record(|| {
            untracked(|| track(|| Rc::new(Dummy(a))));
        });
        assert!(sources.is_empty(), "untracked reads should not be recorded");
    }

    #[test]
    fn test_frame_popped_after_panic() {
        let result = panic::catch_unwind(|| {
            record(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(!is_tracking(), "tracking stack should be empty after unwinding");
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let listeners: Rc<Listeners<i32>> = Rc::new(Listeners::default());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let second_id = Rc::new(Cell::new(0));
        let l = listeners.clone();
        let second = second_id.clone();
        let seen_first = seen.clone();
        listeners.add(Rc::new(move |v: &i32| {
            seen_first.borrow_mut().push(("first", *v));
            l.remove(second.get());
        }));
        let seen_second = seen.clone();
        second_id.set(listeners.add(Rc::new(move |v: &i32| {
            seen_second.borrow_mut().push(("second", *v));
        })));

        listeners.dispatch(&7, next_signal_id());
        assert_eq!(*seen.borrow(), vec![("first", 7)]);
    }
}
