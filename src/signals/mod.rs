//! Signal core.
//!
//! - [`Signal`]: writable state cell
//! - [`Derived`]: lazily computed value with dynamic dependency tracking
//! - [`Subscription`]: revocable listener registration
//! - combinators: [`flatten`], [`defer`], [`awaited`] / [`await_signal`]
//!
//! Everything is single-threaded and lives in thread-local storage.

mod awaited;
mod defer;
mod derived;
mod flatten;
mod read;
mod runtime;
mod state;
mod subscription;

pub use awaited::{AsyncState, Awaited, Promise, Resolver, await_signal, awaited};
pub use defer::{Deferred, defer, defer_default};
pub use derived::{Derived, derive_memo, derived};
pub use flatten::flatten;
pub use read::{ReadSignal, Readable, subscribe};
pub use runtime::{Listener, SignalId, is_tracking, untracked};
pub use state::{Signal, signal};
pub use subscription::{SubscribeMode, Subscription};
