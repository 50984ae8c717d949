use super::derived::Derived;
use super::read::Readable;

/// Collapse a signal of signals into the inner value.
///
/// Recomputes when the outer signal switches to another inner signal and when
/// the current inner signal changes. The previous inner signal is released on
/// the first recompute after the switch.
pub fn flatten<T, S, O>(outer: O) -> Derived<T>
where
    T: Clone + 'static,
    S: Readable<T> + Clone + 'static,
    O: Readable<S> + 'static,
{
    Derived::new(move || outer.get().get())
}
