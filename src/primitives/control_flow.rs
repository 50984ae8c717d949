//! Control Flow Primitives - list, branch and async rendering.
//!
//! Each helper is a derived signal over its input, so the result drops into
//! a template slot like any other signal:
//! - [`each`] - keyed list rendering that reuses per-item output
//! - [`switch`] - branching that re-renders only when the branch changes
//! - [`when`] - pending / resolved / rejected rendering of an async state
//!
//! Render callbacks always run untracked: reads inside them never make the
//! helper itself depend on more signals.
//!
//! ```ignore
//! let todos = signal(vec![Todo::new(1, "write tests")]);
//! let rows = each(&todos)
//!     .key(|todo| todo.id)
//!     .map(|todo, _index| html!("<li>" {move || todo.get().title} "</li>").into_value());
//! html!("<ul>" {rows} "</ul>")
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::pipeline::Value;
use crate::signals::{AsyncState, Derived, ReadSignal, Readable, Signal, signal, untracked};

use super::types::MaybeSignal;

// =============================================================================
// each() - Keyed list rendering
// =============================================================================

/// Render a list, reusing the output of items that stay in it.
///
/// Finish the builder with [`Each::key`] and [`KeyedEach::map`], or with
/// [`Each::map`] to key items by their own value. Each key gets one cached
/// entry holding the rendered output and two signals, the item and its
/// index. When the list changes, kept entries have those signals updated in
/// place and are not rendered again. Entries for vanished keys are dropped.
/// If two items share a key the later one wins.
///
/// # Arguments
///
/// * `source` - A static `Vec`, a signal of one, or a getter (see [`MaybeSignal`])
///
/// # Returns
///
/// A builder; its `map` returns a `Derived<Vec<V>>` usable as a template value.
///
/// # Example
///
/// ```ignore
/// let todos = signal(vec![Todo::new(1, "parse"), Todo::new(2, "bind")]);
///
/// let rows = each(&todos)
///     .key(|todo| todo.id)
///     .map(|todo, index| {
///         html!("<li data-index=" {index} ">" {move || todo.get().title} "</li>").into_value()
///     });
///
/// // Row 1 is reused; only its index signal changes
/// todos.update(|list| list.insert(0, Todo::new(0, "plan")));
/// ```
pub fn each<T: Clone + PartialEq + 'static>(source: impl Into<MaybeSignal<Vec<T>>>) -> Each<T> {
    Each {
        source: source.into(),
    }
}

/// Unkeyed list builder. See [`each`].
pub struct Each<T: Clone + 'static> {
    source: MaybeSignal<Vec<T>>,
}

/// List builder with a key function.
pub struct KeyedEach<T: Clone + 'static, K> {
    source: MaybeSignal<Vec<T>>,
    key: Rc<dyn Fn(&T) -> K>,
}

struct Entry<T, V> {
    item: Signal<T>,
    index: Signal<usize>,
    output: V,
}

impl<T: Clone + PartialEq + 'static> Each<T> {
    /// Identify items by `key` instead of by value.
    pub fn key<K>(self, key: impl Fn(&T) -> K + 'static) -> KeyedEach<T, K>
    where
        K: Eq + Hash + Clone + 'static,
    {
        KeyedEach {
            source: self.source,
            key: Rc::new(key),
        }
    }

    /// Render each item, keyed by the item itself.
    pub fn map<V, F>(self, render: F) -> Derived<Vec<V>>
    where
        T: Eq + Hash,
        V: Clone + 'static,
        F: Fn(ReadSignal<T>, ReadSignal<usize>) -> V + 'static,
    {
        self.key(T::clone).map(render)
    }
}

impl<T, K> KeyedEach<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Render each item once per key.
    ///
    /// `render` receives read-only signals for the item and its index. When
    /// a key reappears in a later emission its output is reused and the
    /// signals are updated in place. Keys that disappear are dropped. If a
    /// key repeats within one emission the last item wins.
    pub fn map<V, F>(self, render: F) -> Derived<Vec<V>>
    where
        V: Clone + 'static,
        F: Fn(ReadSignal<T>, ReadSignal<usize>) -> V + 'static,
    {
        let KeyedEach { source, key } = self;
        let cache: RefCell<HashMap<K, Entry<T, V>>> = RefCell::new(HashMap::new());

        Derived::new(move || {
            let items = source.get();
            let mut present = HashSet::with_capacity(items.len());
            let mut output = Vec::with_capacity(items.len());
            let mut created = 0usize;

            for (index, item) in items.into_iter().enumerate() {
                let item_key = key(&item);
                present.insert(item_key.clone());

                let cached = cache
                    .borrow()
                    .get(&item_key)
                    .map(|entry| (entry.item.clone(), entry.index.clone(), entry.output.clone()));

                match cached {
                    Some((item_signal, index_signal, rendered)) => {
                        if item_signal.peek() != item {
                            item_signal.set(item);
                        }
                        if index_signal.peek() != index {
                            index_signal.set(index);
                        }
                        output.push(rendered);
                    }
                    None => {
                        let item_signal = signal(item);
                        let index_signal = signal(index);
                        let rendered = untracked(|| render(item_signal.read_only(), index_signal.read_only()));
                        cache.borrow_mut().insert(
                            item_key,
                            Entry {
                                item: item_signal,
                                index: index_signal,
                                output: rendered.clone(),
                            },
                        );
                        output.push(rendered);
                        created += 1;
                    }
                }
            }

            let mut cache = cache.borrow_mut();
            let before = cache.len();
            cache.retain(|k, _| present.contains(k));
            trace!(
                items = output.len(),
                created,
                dropped = before - cache.len(),
                "each reconciled"
            );
            output
        })
    }
}

// =============================================================================
// switch() - Branch rendering
// =============================================================================

/// Render one of several branches depending on `value`.
///
/// Cases are compared in the order they were added. The branch function
/// runs only when the selected case changes; while the same case stays
/// selected its cached output is re-emitted.
///
/// # Arguments
///
/// * `value` - The value to branch on: static, a signal, or a getter
///
/// # Returns
///
/// A builder. Add branches with [`Switch::case`], then finish with
/// [`Switch::default`] (or `build` when `V` is an `Option`).
///
/// # Example
///
/// ```ignore
/// let tab = signal(Tab::Home);
///
/// let view = switch(&tab)
///     .case(Tab::Home, || html!("<home-page></home-page>").into_value())
///     .case(Tab::About, || html!("<about-page></about-page>").into_value())
///     .default(|| Value::Empty);
///
/// tab.set(Tab::About); // home page removed, about page rendered
/// tab.set(Tab::About); // same case: nothing re-rendered
/// ```
pub fn switch<T, V>(value: impl Into<MaybeSignal<T>>) -> Switch<T, V>
where
    T: Clone + PartialEq + 'static,
    V: Clone + 'static,
{
    Switch {
        value: value.into(),
        cases: Vec::new(),
    }
}

/// Branch builder. See [`switch`].
pub struct Switch<T: Clone + 'static, V> {
    value: MaybeSignal<T>,
    cases: Vec<(T, Rc<dyn Fn() -> V>)>,
}

impl<T, V> Switch<T, V>
where
    T: Clone + PartialEq + 'static,
    V: Clone + 'static,
{
    /// Render `render` while the value equals `value`. The first matching
    /// case wins.
    pub fn case(mut self, value: T, render: impl Fn() -> V + 'static) -> Self {
        self.cases.push((value, Rc::new(render)));
        self
    }

    /// Finish with a fallback for values no case matches.
    pub fn default(self, fallback: impl Fn() -> V + 'static) -> Derived<V> {
        let Switch { value, cases } = self;
        let fallback: Rc<dyn Fn() -> V> = Rc::new(fallback);
        // (selected case, output); `None` selects the fallback.
        let current: RefCell<Option<(Option<usize>, V)>> = RefCell::new(None);

        Derived::new(move || {
            let value = value.get();
            let selected = cases.iter().position(|(case, _)| *case == value);

            if let Some((previous, rendered)) = current.borrow().as_ref() {
                if *previous == selected {
                    return rendered.clone();
                }
            }

            debug!(case = ?selected, "switch branch changed");
            let render = match selected {
                Some(index) => cases[index].1.clone(),
                None => fallback.clone(),
            };
            let rendered = untracked(|| render());
            *current.borrow_mut() = Some((selected, rendered.clone()));
            rendered
        })
    }
}

impl<T, V> Switch<T, Option<V>>
where
    T: Clone + PartialEq + 'static,
    V: Clone + 'static,
{
    /// Finish without a fallback; unmatched values yield `None`.
    pub fn build(self) -> Derived<Option<V>> {
        self.default(|| None)
    }
}

// =============================================================================
// when() - Async state rendering
// =============================================================================

/// Renderers for [`when`].
///
/// ```ignore
/// WhenOptions::new(|user: User| html!("<p>" {user.name} "</p>").into_value())
///     .pending(|| "Loading...".into_value())
///     .catch(|err: String| format!("Error: {err}").into_value())
/// ```
pub struct WhenOptions<T, E> {
    /// Render for the pending state. Renders nothing when `None`.
    pub pending: Option<Box<dyn Fn() -> Value>>,
    /// Render for the resolved state.
    pub then_fn: Box<dyn Fn(T) -> Value>,
    /// Render for the rejected state. Renders nothing when `None`.
    pub catch_fn: Option<Box<dyn Fn(E) -> Value>>,
}

impl<T, E> WhenOptions<T, E> {
    pub fn new(then_fn: impl Fn(T) -> Value + 'static) -> Self {
        Self {
            pending: None,
            then_fn: Box::new(then_fn),
            catch_fn: None,
        }
    }

    pub fn pending(mut self, render: impl Fn() -> Value + 'static) -> Self {
        self.pending = Some(Box::new(render));
        self
    }

    pub fn catch(mut self, render: impl Fn(E) -> Value + 'static) -> Self {
        self.catch_fn = Some(Box::new(render));
        self
    }
}

/// Render the pending, resolved or rejected form of an async state.
///
/// # Arguments
///
/// * `state` - Signal of [`AsyncState`], typically an [`Awaited`](crate::signals::Awaited)
/// * `options` - Renderers per state. `pending` and `catch` are optional;
///   a missing one renders nothing
///
/// # Returns
///
/// A `Derived<Value>` that follows `state`. Renderers run untracked.
///
/// # Example
///
/// ```ignore
/// let (promise, resolver) = Promise::<User, String>::channel();
/// let user = awaited(promise).error(|err| warn!(%err, "load failed"));
///
/// let view = when(
///     user,
///     WhenOptions::new(|user: User| html!("<p>" {user.name} "</p>").into_value())
///         .pending(|| "Loading...".into_value())
///         .catch(|err: String| format!("Error: {err}").into_value()),
/// );
///
/// resolver.resolve(User::new("ada")); // "Loading..." replaced on the next drain
/// ```
///
/// Rejections without a `catch` render nothing; report them with
/// [`Awaited::error`](crate::signals::Awaited::error).
pub fn when<T, E, S>(state: S, options: WhenOptions<T, E>) -> Derived<Value>
where
    T: Clone + 'static,
    E: Clone + 'static,
    S: Readable<AsyncState<T, E>> + 'static,
{
    Derived::new(move || {
        let state = state.get();
        untracked(|| match state {
            AsyncState::Pending => options.pending.as_ref().map_or(Value::Empty, |render| render()),
            AsyncState::Resolved(value) => (options.then_fn)(value),
            AsyncState::Rejected(err) => match &options.catch_fn {
                Some(render) => render(err),
                None => {
                    debug!("rejected state rendered without a catch_fn");
                    Value::Empty
                }
            },
        })
    })
}

// =============================================================================
// Tests
// =============================================================================
