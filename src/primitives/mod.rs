//! Structural Helpers - lists, branches, async states and components.
//!
//! # Reactivity
//!
//! Inputs can be:
//! - Static values: `switch(Tab::Home)`
//! - Signals: `each(&todos)` (stays connected)
//! - Getters: `each(MaybeSignal::getter(move || visible_todos()))`
//!
//! Pass the signal itself, not its current value, to keep the helper live:
//!
//! ```ignore
//! // CORRECT - re-renders when `tab` changes
//! switch(&tab).case(Tab::Home, home).default(not_found);
//!
//! // WRONG - reads once, never updates
//! switch(tab.get()).case(Tab::Home, home).default(not_found);
//! ```

mod component;
mod control_flow;
mod types;

pub use component::Component;
pub use control_flow::{Each, KeyedEach, Switch, WhenOptions, each, switch, when};
pub use types::MaybeSignal;
