//! # spark-html
//!
//! Fine-grained reactive DOM templating for Rust.
//!
//! Signals hold state; templates bind them to DOM nodes. When a signal
//! changes, only the text, attribute or range that read it updates. There
//! is no virtual DOM and no diffing of whole trees.
//!
//! ## Architecture
//!
//! ```text
//! html!(..) → template (parsed once per call site) → hydrate → nodes → mount
//!                                                        │
//!                signals ──── live bindings ◄────────────┘
//!                                  │
//!                       lifecycle tracker (subscribe on mount, release on unmount)
//! ```
//!
//! ## Modules
//!
//! - [`signals`] - State, derived values, subscriptions and combinators
//! - [`scheduler`] - Virtual clock, timers and the local task pool
//! - [`dom`] - The in-memory DOM the library renders into
//! - [`lifecycle`] - Per-node mount and unmount callbacks
//! - [`template`] - Template parsing and the template cache
//! - [`pipeline`] - Hydration, value binding and mounting
//! - [`primitives`] - `each`, `switch`, `when` and [`Component`]
//! - [`config`] - Thread-local runtime settings
//!
//! ## Example
//!
//! ```ignore
//! use spark_html::{html, mount_to_body, on, signal};
//!
//! let count = signal(0);
//! let increment = {
//!     let count = count.clone();
//!     on(move |_| count.update(|n| *n += 1))
//! };
//! mount_to_body(html!(
//!     "<button onclick=" {increment} ">Clicked " {count.clone()} " times</button>"
//! ));
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod primitives;
pub mod scheduler;
pub mod signals;
pub mod template;

// Re-export commonly used items
pub use error::{Error, Result, TemplateError};

pub use signals::{
    AsyncState, Awaited, Deferred, Derived, Promise, ReadSignal, Readable, Resolver, Signal, SignalId,
    SubscribeMode, Subscription, await_signal, awaited, defer, defer_default, derive_memo, derived, flatten,
    is_tracking, signal, subscribe, untracked,
};

pub use lifecycle::{Cleanup, IntoCleanup, cleanup, effect, on_mount, on_unmount};

pub use pipeline::{IntoValue, MountHandle, Render, Value, directive, html, hydrate, mount, mount_to_body, on};

pub use primitives::{Component, MaybeSignal, WhenOptions, each, switch, when};

pub use template::{Template, parse_template};

pub use dom::{Event, Node};

/// Render a template.
///
/// String literals are markup; `{expr}` blocks are values, converted with
/// [`IntoValue`]. Adjacent literals are joined. Each invocation site owns a
/// `static` string slice, so its markup is parsed once per thread.
///
/// ```ignore
/// let name = signal("world".to_string());
/// let nodes: Vec<Node> = html!("<p class=" {"greeting"} ">Hello " {name.clone()} "!</p>")?;
/// ```
///
/// Positions:
/// - text: `"<p>" {value} "</p>"`
/// - attribute value: `"<a href=" {url} ">"` or `"<a class=\"btn " {tone} "\">"`
/// - event: `"<button onclick=" {on(handler)} ">"`
/// - directive: `"<input " {directive(f)} ">"`
/// - stand-in: `"<" {component} ">children</" {()} ">"`
#[macro_export]
macro_rules! html {
    ($($tokens:tt)*) => {
        $crate::__html_munch!([] [] [] $($tokens)*)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __html_munch {
    // Literal: extend the current string segment.
    ([$([$($done:literal),*])*] [$($value:expr),*] [$($current:literal),*] $lit:literal $($rest:tt)*) => {
        $crate::__html_munch!([$([$($done),*])*] [$($value),*] [$($current,)* $lit] $($rest)*)
    };
    // Value: close the current segment.
    ([$([$($done:literal),*])*] [$($value:expr),*] [$($current:literal),*] { $next:expr } $($rest:tt)*) => {
        $crate::__html_munch!([$([$($done),*])* [$($current),*]] [$($value,)* $next] [] $($rest)*)
    };
    ([$([$($done:literal),*])*] [$($value:expr),*] [$($current:literal),*]) => {{
        static STRINGS: &[&str] = &[$(::core::concat!("" $(, $done)*),)* ::core::concat!("" $(, $current)*)];
        $crate::html(STRINGS, ::std::vec![$($crate::IntoValue::into_value($value)),*])
    }};
}
