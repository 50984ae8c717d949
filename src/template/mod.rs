//! Template Parser - static template strings to cached skeletons.
//!
//! The static parts of a template are joined with generated placeholder
//! tokens, parsed as HTML into a fragment, and scanned for tokens. The
//! result is a [`Template`]: the skeleton fragment plus one [`Slot`] per
//! dynamic position. Templates are cached by the identity of the static
//! string slice, so each `html!` call site is parsed once per thread.

mod cache;
mod descriptor;
mod parser;
mod placeholder;

pub use cache::{Template, cached_templates, parse_template};
pub use descriptor::{AttrPart, AttributeParts, Slot, SlotKind};
pub use parser::decode_entities;
