//! State signals - writable reactive cells.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::read::{ReadSignal, Readable};
use super::runtime::{self, Listener, ListenerId, Listeners, SignalId, Source};
use super::subscription::{SubscribeMode, Subscription};

/// A writable reactive cell.
///
/// Cloning a `Signal` clones the handle, not the value. Every write notifies
/// subscribers; writing a value equal to the current one is still a write.
///
/// ```ignore
/// let count = signal(0);
/// let sub = count.subscribe(|v| println!("count = {v}"), SubscribeMode::Immediate);
/// count.set(1);
/// count.notify(); // redelivers 1 without changing it
/// sub.unsubscribe();
/// ```
pub struct Signal<T> {
    inner: Rc<StateInner<T>>,
}

struct StateInner<T> {
    id: SignalId,
    value: RefCell<T>,
    version: Cell<u64>,
    listeners: Listeners<T>,
}

/// Create a state signal.
pub fn signal<T: Clone + 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

impl<T: Clone + 'static> Signal<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(StateInner {
                id: runtime::next_signal_id(),
                value: RefCell::new(initial),
                version: Cell::new(0),
                listeners: Listeners::default(),
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Read the value, recording a dependency in the active derived
    /// computation.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        runtime::track(|| inner.clone() as Rc<dyn Source>);
        self.peek()
    }

    /// Read the value without recording a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.inner.value.borrow_mut();
            f(&mut value);
        }
        self.notify();
    }

    /// Redeliver the current value without changing it.
    ///
    /// Useful after mutating shared interior data the signal merely points
    /// at, where no new value was written.
    pub fn notify(&self) {
        let inner = &self.inner;
        inner.version.set(inner.version.get() + 1);
        let value = self.peek();
        inner.listeners.dispatch(&value, inner.id);
    }

    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static, mode: SubscribeMode) -> Subscription {
        self.subscribe_with(Rc::new(listener), mode)
    }

    /// Number of registered listeners, including dependent derived signals.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Readable<T> for Signal<T> {
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn peek(&self) -> T {
        Signal::peek(self)
    }

    fn version(&self) -> u64 {
        Signal::version(self)
    }

    fn id(&self) -> SignalId {
        self.inner.id
    }

    fn subscribe_with(&self, listener: Listener<T>, mode: SubscribeMode) -> Subscription {
        let id = self.inner.listeners.add(listener.clone());
        let subscription = Subscription::new(self.inner.clone(), id);
        if mode == SubscribeMode::Immediate {
            let value = self.peek();
            runtime::untracked(|| runtime::invoke_listener(&listener, &value, self.inner.id));
        }
        subscription
    }
}

impl<T: 'static> Source for StateInner<T> {
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

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

impl<T: Clone + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
