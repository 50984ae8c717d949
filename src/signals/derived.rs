//! Derived signals - lazily computed, dynamically tracked values.
//!
//! A derived signal runs its compute function inside a recording frame and
//! subscribes to exactly the signals read during that run. Dependencies not
//! read in the latest run are dropped. When a dependency notifies:
//! - with subscribers: recompute now and deliver the new value
//! - without subscribers: mark dirty; the next read recomputes
//!
//! Sources only hold weak references back to derived signals, so a derived
//! signal lives as long as its owners and subscriptions.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::read::{ReadSignal, Readable};
use super::runtime::{self, Listener, ListenerId, Listeners, SignalId, Source};
use super::subscription::{SubscribeMode, Subscription};

/// Upper bound on back-to-back recomputes triggered by writes made while
/// the compute function runs.
const MAX_RECOMPUTE_PASSES: usize = 100;

/// A read-only signal computed from other signals.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

struct DerivedInner<T> {
    id: SignalId,
    compute: Rc<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    computing: Cell<bool>,
    version: Cell<u64>,
    deps: RefCell<Vec<(Rc<dyn Source>, ListenerId)>>,
    listeners: Listeners<T>,
}

/// Create a derived signal.
pub fn derived<T: Clone + 'static>(compute: impl Fn() -> T + 'static) -> Derived<T> {
    Derived::new(compute)
}

impl<T: Clone + 'static> Derived<T> {
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::from_rc(Rc::new(compute))
    }

    pub fn from_rc(compute: Rc<dyn Fn() -> T>) -> Self {
        Self {
            inner: Rc::new(DerivedInner {
                id: runtime::next_signal_id(),
                compute,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                computing: Cell::new(false),
                version: Cell::new(0),
                deps: RefCell::new(Vec::new()),
                listeners: Listeners::default(),
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Current value, recomputing if a dependency changed since the last run.
    /// Records a dependency on this signal in the enclosing computation.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        runtime::track(|| inner.clone() as Rc<dyn Source>);
        self.peek()
    }

    /// Current value without recording a dependency.
    pub fn peek(&self) -> T {
        self.inner.refresh();
        self.inner.cached()
    }

    /// Number of recomputations so far.
    pub fn version(&self) -> u64 {
        self.inner.refresh();
        self.inner.version.get()
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of signals read during the latest computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static, mode: SubscribeMode) -> Subscription {
        self.subscribe_with(Rc::new(listener), mode)
    }

    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> DerivedInner<T> {
    fn cached(&self) -> T {
        match self.value.borrow().as_ref() {
            Some(value) => value.clone(),
            None => panic!("derived signal {:?} has no value after refresh", self.id),
        }
    }

    /// Recompute if dirty. A panic in the compute function propagates to
    /// the caller and leaves the signal dirty.
    ///
    /// A dependency that notifies while the compute function runs marks the
    /// signal dirty again, so the run repeats until it reads a settled state.
    fn refresh(self: &Rc<Self>) {
        if self.computing.get() {
            if self.value.borrow().is_some() {
                // Read of itself during its own computation; serve the stale value.
                return;
            }
            panic!("derived signal {:?} read itself during its first computation", self.id);
        }

        let mut passes = 0;
        while self.dirty.get() {
            if passes == MAX_RECOMPUTE_PASSES {
                warn!(signal = ?self.id, passes, "dependencies keep changing during recompute; giving up");
                return;
            }
            passes += 1;

            let _computing = ComputingGuard::enter(&self.computing, &self.dirty);
            let (value, sources) = runtime::record(|| (self.compute)());
            self.rewire(sources);
            *self.value.borrow_mut() = Some(value);
            self.version.set(self.version.get() + 1);
            trace!(signal = ?self.id, version = self.version.get(), "recomputed");
        }
    }

    /// Diff the dependency set against the sources read in the latest run.
    fn rewire(self: &Rc<Self>, sources: Vec<Rc<dyn Source>>) {
        let previous = std::mem::take(&mut *self.deps.borrow_mut());
        let mut next: Vec<(Rc<dyn Source>, ListenerId)> = Vec::with_capacity(sources.len());

        for (source, listener) in previous {
            let id = source.source_id();
            if sources.iter().any(|s| s.source_id() == id) {
                next.push((source, listener));
            } else {
                source.remove_listener(listener);
            }
        }
        for source in sources {
            let id = source.source_id();
            if next.iter().any(|(s, _)| s.source_id() == id) {
                continue;
            }
            let listener = source.add_dependent(self.dependency_callback());
            next.push((source, listener));
        }

        *self.deps.borrow_mut() = next;
    }

    fn dependency_callback(self: &Rc<Self>) -> Rc<dyn Fn()> {
        let weak: Weak<Self> = Rc::downgrade(self);
        Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_dependency_changed();
            }
        })
    }

    fn on_dependency_changed(self: &Rc<Self>) {
        self.dirty.set(true);
        if self.computing.get() || self.listeners.is_empty() {
            return;
        }
        self.refresh();
        let value = self.cached();
        self.listeners.dispatch(&value, self.id);
    }
}

impl<T> Drop for DerivedInner<T> {
    fn drop(&mut self) {
        for (source, listener) in self.deps.get_mut().drain(..) {
            source.remove_listener(listener);
        }
    }
}

/// Marks a computation in progress. Entering clears the dirty flag; a
/// panicking compute function sets it again.
struct ComputingGuard<'a> {
    computing: &'a Cell<bool>,
    dirty: &'a Cell<bool>,
}

impl<'a> ComputingGuard<'a> {
    fn enter(computing: &'a Cell<bool>, dirty: &'a Cell<bool>) -> Self {
        computing.set(true);
        dirty.set(false);
        Self { computing, dirty }
    }
}

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.computing.set(false);
        if std::thread::panicking() {
            self.dirty.set(true);
        }
    }
}

impl<T: Clone + 'static> Readable<T> for Derived<T> {
    fn get(&self) -> T {
        Derived::get(self)
    }

    fn peek(&self) -> T {
        Derived::peek(self)
    }

    fn version(&self) -> u64 {
        Derived::version(self)
    }

    fn id(&self) -> SignalId {
        self.inner.id
    }

    fn subscribe_with(&self, listener: Listener<T>, mode: SubscribeMode) -> Subscription {
        // Compute first so the dependency links exist before anyone listens.
        self.inner.refresh();
        let id = self.inner.listeners.add(listener.clone());
        let subscription = Subscription::new(self.inner.clone(), id);
        if mode == SubscribeMode::Immediate {
            let value = self.inner.cached();
            runtime::untracked(|| runtime::invoke_listener(&listener, &value, self.inner.id));
        }
        subscription
    }
}

impl<T: Clone + 'static> Source for DerivedInner<T> {
    fn source_id(&self) -> SignalId {
        self.id
    }

    fn add_dependent(&self, on_change: Rc<dyn Fn()>) -> ListenerId {
        self.listeners.add_dependent(on_change)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

// =============================================================================
// Memoization by function identity
// =============================================================================

thread_local! {
    /// Compute-function address -> derived signal, held weakly.
    static MEMO: RefCell<HashMap<usize, Weak<dyn Any>>> = RefCell::new(HashMap::new());
}

const MEMO_PRUNE_THRESHOLD: usize = 64;

/// Derived signal for `compute`, shared by every caller passing the same `Rc`.
///
/// The derived signal keeps `compute` alive, so the address key cannot be
/// reused while the cached entry is still upgradeable.
pub fn derive_memo<T: Clone + 'static>(compute: &Rc<dyn Fn() -> T>) -> Derived<T> {
    let key = Rc::as_ptr(compute) as *const () as usize;

    let existing = MEMO.with(|memo| memo.borrow().get(&key).and_then(Weak::upgrade));
    if let Some(existing) = existing {
        if let Ok(inner) = existing.downcast::<DerivedInner<T>>() {
            return Derived { inner };
        }
    }

    let derived = Derived::from_rc(compute.clone());
    let erased: Rc<dyn Any> = derived.inner.clone();
    MEMO.with(|memo| {
        let mut memo = memo.borrow_mut();
        if memo.len() >= MEMO_PRUNE_THRESHOLD {
            memo.retain(|_, entry| entry.strong_count() > 0);
        }
        memo.insert(key, Rc::downgrade(&erased));
    });
    derived
}
