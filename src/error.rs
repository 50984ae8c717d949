//! Error types.
//!
//! Template problems are reported when a template is parsed or instantiated,
//! synchronously, to whoever called [`html`](crate::html) or
//! [`parse_template`](crate::template::parse_template). Everything else in the
//! crate is infallible by construction or reported through `tracing`.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The static template could not be parsed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A template was invoked with the wrong number of interpolated values.
    #[error("template expects {expected} interpolated values, got {found}")]
    ValueCount { expected: usize, found: usize },
}

/// Parse-time template failures.
///
/// `offset` fields are byte offsets into the joined template source (static
/// parts with placeholder tokens substituted for interpolations).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated tag starting at offset {offset}")]
    UnterminatedTag { offset: usize },

    #[error("unterminated comment starting at offset {offset}")]
    UnterminatedComment { offset: usize },

    #[error("unterminated value for attribute `{name}` at offset {offset}")]
    UnterminatedAttribute { name: String, offset: usize },

    #[error("closing tag </{found}> at offset {offset} does not match open <{expected}>")]
    MismatchedClosingTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("closing tag </{tag}> at offset {offset} has no open element")]
    UnexpectedClosingTag { tag: String, offset: usize },

    #[error("element <{tag}> is never closed")]
    UnclosedElement { tag: String },

    /// A stand-in element was closed by a regular tag, or a regular element
    /// by a stand-in closing tag.
    #[error("stand-in element closed by mismatched tag at offset {offset}")]
    MismatchedStandIn { offset: usize },

    #[error("interpolation inside {context} is not supported")]
    InvalidPlaceholderPosition { context: &'static str },
}
