//! Primitive types - values that may or may not be reactive.

use std::fmt;
use std::rc::Rc;

use crate::signals::{Derived, ReadSignal, Readable, Signal};

// =============================================================================
// MaybeSignal - Reactive input wrapper
// =============================================================================

/// An input that can be static, a signal, or a getter.
///
/// Structural helpers read it inside their derived computation, so a signal
/// or a getter that reads signals keeps the helper live.
#[derive(Clone)]
pub enum MaybeSignal<T: Clone + 'static> {
    /// Static value (not reactive).
    Static(T),
    /// Reactive signal.
    Signal(ReadSignal<T>),
    /// Getter function, called on each read.
    Getter(Rc<dyn Fn() -> T>),
}

impl<T: Clone + 'static> MaybeSignal<T> {
    /// Current value; records a dependency when reactive.
    pub fn get(&self) -> T {
        match self {
            MaybeSignal::Static(v) => v.clone(),
            MaybeSignal::Signal(s) => s.get(),
            MaybeSignal::Getter(f) => f(),
        }
    }

    pub fn is_reactive(&self) -> bool {
        !matches!(self, MaybeSignal::Static(_))
    }

    pub fn getter(f: impl Fn() -> T + 'static) -> Self {
        MaybeSignal::Getter(Rc::new(f))
    }
}

impl<T: Clone + Default + 'static> Default for MaybeSignal<T> {
    fn default() -> Self {
        MaybeSignal::Static(T::default())
    }
}

impl<T: Clone + 'static> From<T> for MaybeSignal<T> {
    fn from(value: T) -> Self {
        MaybeSignal::Static(value)
    }
}

impl<T: Clone + 'static> From<Signal<T>> for MaybeSignal<T> {
    fn from(signal: Signal<T>) -> Self {
        MaybeSignal::Signal(signal.read_only())
    }
}

impl<T: Clone + 'static> From<&Signal<T>> for MaybeSignal<T> {
    fn from(signal: &Signal<T>) -> Self {
        MaybeSignal::Signal(signal.read_only())
    }
}

impl<T: Clone + 'static> From<Derived<T>> for MaybeSignal<T> {
    fn from(derived: Derived<T>) -> Self {
        MaybeSignal::Signal(derived.read_only())
    }
}

impl<T: Clone + 'static> From<ReadSignal<T>> for MaybeSignal<T> {
    fn from(signal: ReadSignal<T>) -> Self {
        MaybeSignal::Signal(signal)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for MaybeSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeSignal::Static(v) => f.debug_tuple("Static").field(v).finish(),
            MaybeSignal::Signal(s) => f.debug_tuple("Signal").field(&s.id()).finish(),
            MaybeSignal::Getter(_) => write!(f, "Getter(..)"),
        }
    }
}
