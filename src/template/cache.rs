//! Parsed templates and the identity-keyed template cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::dom::Node;
use crate::error::Result;

use super::descriptor::{self, Slot};
use super::parser;
use super::placeholder::Placeholders;

/// A parsed template: the static skeleton plus its slot descriptors.
#[derive(Debug)]
pub struct Template {
    fragment: Node,
    slots: Vec<Slot>,
    value_count: usize,
}

impl Template {
    /// Parse template strings without consulting the cache.
    pub fn parse(strings: &[&str]) -> Result<Self> {
        let placeholders = Placeholders::generate();
        let value_count = strings.len().saturating_sub(1);

        let mut source = String::with_capacity(strings.iter().map(|s| s.len() + 24).sum());
        for (index, part) in strings.iter().enumerate() {
            source.push_str(part);
            if index < value_count {
                source.push_str(&placeholders.token(index));
            }
        }

        let parsed = parser::parse(&source, &placeholders)?;
        let slots = descriptor::extract_slots(&parsed.fragment, &placeholders);
        descriptor::validate(&slots, &parsed.closing_indices, value_count)?;

        debug!(values = value_count, slots = slots.len(), "parsed template");
        Ok(Self {
            fragment: parsed.fragment,
            slots,
            value_count,
        })
    }

    /// The static skeleton. Never insert it directly; clone it.
    pub fn fragment(&self) -> &Node {
        &self.fragment
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of interpolated values the template expects.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Markup of the skeleton, with slot placeholders as empty comments.
    pub fn skeleton_html(&self) -> String {
        self.fragment.inner_html()
    }

    /// Fresh deep copy of the skeleton.
    pub(crate) fn instantiate(&self) -> Node {
        self.fragment.clone_node(true)
    }
}

thread_local! {
    /// (address, length) of the static string slice -> parsed template.
    static CACHE: RefCell<HashMap<(usize, usize), Rc<Template>>> = RefCell::new(HashMap::new());
}

/// Parse `strings`, reusing the result for every later call with the same
/// static slice. Failed parses are not cached.
pub fn parse_template(strings: &'static [&'static str]) -> Result<Rc<Template>> {
    let key = (strings.as_ptr() as usize, strings.len());
    if let Some(template) = CACHE.with(|cache| cache.borrow().get(&key).cloned()) {
        return Ok(template);
    }

    let template = Rc::new(Template::parse(strings)?);
    CACHE.with(|cache| cache.borrow_mut().insert(key, template.clone()));
    Ok(template)
}

/// Number of cached templates on this thread.
pub fn cached_templates() -> usize {
    CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TemplateError};

    static GREETING: [&str; 2] = ["<p class=\"greeting\">Hello ", "!</p>"];

    #[test]
    fn test_same_slice_is_parsed_once() {
        let first = parse_template(&GREETING).unwrap();
        let second = parse_template(&GREETING).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.value_count(), 1);
        assert_eq!(first.skeleton_html(), "<p class=\"greeting\">Hello <!---->!</p>");
    }

    #[test]
    fn test_equal_content_different_slice_parses_again() {
        static OTHER: [&str; 2] = ["<p class=\"greeting\">Hello ", "!</p>"];
        let a = parse_template(&GREETING).unwrap();
        let b = parse_template(&OTHER).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a.skeleton_html(), b.skeleton_html());
    }

    #[test]
    fn test_errors_are_not_cached() {
        static BROKEN: [&str; 1] = ["<div>"];
        let before = cached_templates();
        assert_eq!(
            parse_template(&BROKEN).err(),
            Some(Error::Template(TemplateError::UnclosedElement { tag: "div".into() }))
        );
        assert_eq!(cached_templates(), before);
    }

    #[test]
    fn test_placeholder_inside_raw_text_is_rejected() {
        let result = Template::parse(&["<style>.a { color: ", " }</style>"]);
        assert!(matches!(
            result,
            Err(Error::Template(TemplateError::InvalidPlaceholderPosition { context: "raw text" }))
        ));
    }
}
