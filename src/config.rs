//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the runtime. Change it with
//! [`configure`] before building any UI:
//!
//! ```ignore
//! use spark_html::config;
//!
//! config::configure(|c| {
//!     c.isolate_listener_panics = false;
//!     c.placeholder_prefix = "app-".into();
//! });
//! ```

use std::cell::RefCell;
use std::time::Duration;

/// Tunables for the signal runtime and template parser.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Prefix of generated placeholder tokens. Must be a valid lowercase tag
    /// name start (ASCII letters, digits and `-`).
    pub placeholder_prefix: String,

    /// Run each subscriber under `catch_unwind` so a panicking listener is
    /// logged instead of aborting delivery to the remaining listeners.
    pub isolate_listener_panics: bool,

    /// Delay used by [`defer_default`](crate::signals::defer_default).
    pub default_defer: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            placeholder_prefix: "sp-".to_string(),
            isolate_listener_panics: true,
            default_defer: Duration::from_millis(16),
        }
    }
}

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Mutate the current thread's configuration.
pub fn configure(f: impl FnOnce(&mut RuntimeConfig)) {
    CONFIG.with(|config| {
        let mut config = config.borrow_mut();
        f(&mut config);
        sanitize_prefix(&mut config.placeholder_prefix);
    });
}

/// Snapshot of the current configuration.
pub fn current() -> RuntimeConfig {
    CONFIG.with(|config| config.borrow().clone())
}

/// Restore defaults.
pub fn reset_config() {
    CONFIG.with(|config| *config.borrow_mut() = RuntimeConfig::default());
}

pub(crate) fn isolate_listener_panics() -> bool {
    CONFIG.with(|config| config.borrow().isolate_listener_panics)
}

pub(crate) fn placeholder_prefix() -> String {
    CONFIG.with(|config| config.borrow().placeholder_prefix.clone())
}

/// Placeholders double as tag names, so the prefix is restricted to what the
/// template parser accepts there. It must also start with a letter.
fn sanitize_prefix(prefix: &mut String) {
    let cleaned: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    *prefix = match cleaned.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => cleaned,
        _ => format!("sp-{cleaned}"),
    };
}
