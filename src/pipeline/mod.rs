//! Rendering Pipeline
//!
//! Connects parsed templates to live DOM nodes.
//!
//! ```text
//! html!(..) → parse_template (cached) → instantiate → bind slots → Vec<Node> → mount
//! ```
//!
//! ## Binding Rules
//!
//! - **Text / child slots**: the value renders to nodes that replace the slot
//!   placeholder. Signals and closures render between two marker comments
//!   and re-render in place on change.
//! - **Attribute slots**: set once, or kept in sync while the element is
//!   mounted. Interpolated attributes go through one derived string.
//! - **Event and directive slots**: `on<event>=${on(..)}` registers a
//!   listener; `<div ${directive(..)}>` hands the element to a callback.
//!
//! Live bindings subscribe on mount and unsubscribe on unmount, so detached
//! content holds no subscriptions.

mod bind;
mod mount;
mod value;

pub use bind::{html, hydrate};
pub use mount::{MountHandle, mount, mount_to_body};
pub use value::{IntoValue, Render, Value, directive, on};

pub(crate) use bind::render_value;
