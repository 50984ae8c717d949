//! Slot extraction.
//!
//! Walks a freshly parsed fragment in document order, turning every token
//! into a [`Slot`] and rewriting the fragment into the static skeleton that
//! is cloned for each render:
//! - tokens inside text split the text node; each becomes an empty comment
//! - token attributes are removed; they are set at render time
//! - stand-in elements stay in place with their children

use crate::dom::{Node, NodeType};
use crate::error::TemplateError;

use super::placeholder::{Placeholders, Segment};

/// One dynamic position in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Child indices from the fragment root to the slot's node.
    pub path: Vec<usize>,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    /// A value in text position. The node at `path` is a placeholder
    /// comment replaced by the rendered value.
    Text { index: usize },
    /// An element whose tag was a value. Its children move into the first
    /// element the value renders.
    Child { index: usize },
    /// An attribute whose value contains one or more values.
    Attribute { name: String, parts: AttributeParts },
    /// A value in attribute-name position, called with the element.
    Directive { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeParts {
    /// The whole attribute value is a single interpolation.
    Whole(usize),
    /// Static text mixed with interpolations.
    Interpolated(Vec<AttrPart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrPart {
    Static(String),
    Slot(usize),
}

impl SlotKind {
    /// Value indices this slot consumes.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            SlotKind::Text { index } | SlotKind::Child { index } | SlotKind::Directive { index } => vec![*index],
            SlotKind::Attribute { parts, .. } => match parts {
                AttributeParts::Whole(index) => vec![*index],
                AttributeParts::Interpolated(parts) => parts
                    .iter()
                    .filter_map(|part| match part {
                        AttrPart::Slot(index) => Some(*index),
                        AttrPart::Static(_) => None,
                    })
                    .collect(),
            },
        }
    }
}

/// Extract slots from `fragment`, rewriting it in place.
pub(crate) fn extract_slots(fragment: &Node, placeholders: &Placeholders) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut path = Vec::new();
    walk_children(fragment, placeholders, &mut path, &mut slots);
    slots
}

fn walk_children(parent: &Node, placeholders: &Placeholders, path: &mut Vec<usize>, slots: &mut Vec<Slot>) {
    let mut index = 0;
    while let Some(child) = parent.child(index) {
        match child.node_type() {
            NodeType::Text => {
                index += split_text(&child, index, placeholders, path, slots);
            }
            NodeType::Element => {
                path.push(index);
                extract_element(&child, placeholders, path, slots);
                walk_children(&child, placeholders, path, slots);
                path.pop();
                index += 1;
            }
            _ => index += 1,
        }
    }
}

/// Replace a text node containing tokens with text and comment nodes.
/// Returns how many nodes now occupy its position.
fn split_text(
    text: &Node,
    index: usize,
    placeholders: &Placeholders,
    path: &[usize],
    slots: &mut Vec<Slot>,
) -> usize {
    let data = text.data();
    if !placeholders.appears_in(&data) {
        return 1;
    }
    let segments = placeholders.split(&data);
    if !segments.iter().any(|s| matches!(s, Segment::Slot(_))) {
        return 1;
    }

    let mut replacement = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Static(s) => replacement.push(Node::text(s)),
            Segment::Slot(value) => {
                let mut slot_path = path.to_vec();
                slot_path.push(index + replacement.len());
                slots.push(Slot {
                    path: slot_path,
                    kind: SlotKind::Text { index: value },
                });
                replacement.push(Node::comment(""));
            }
        }
    }
    let count = replacement.len();
    text.replace_with(&replacement);
    count
}

fn extract_element(element: &Node, placeholders: &Placeholders, path: &[usize], slots: &mut Vec<Slot>) {
    if let Some(index) = element.tag().and_then(|tag| placeholders.parse_token(tag)) {
        slots.push(Slot {
            path: path.to_vec(),
            kind: SlotKind::Child { index },
        });
    }

    for (name, value) in element.attributes() {
        if let Some(index) = placeholders.parse_token(&name) {
            element.remove_attribute(&name);
            slots.push(Slot {
                path: path.to_vec(),
                kind: SlotKind::Directive { index },
            });
            continue;
        }
        if !placeholders.appears_in(&value) {
            continue;
        }
        let segments = placeholders.split(&value);
        let parts = match segments.as_slice() {
            [Segment::Slot(index)] => AttributeParts::Whole(*index),
            _ if segments.iter().any(|s| matches!(s, Segment::Slot(_))) => AttributeParts::Interpolated(
                segments
                    .iter()
                    .map(|segment| match segment {
                        Segment::Static(s) => AttrPart::Static((*s).to_string()),
                        Segment::Slot(index) => AttrPart::Slot(*index),
                    })
                    .collect(),
            ),
            _ => continue,
        };
        element.remove_attribute(&name);
        slots.push(Slot {
            path: path.to_vec(),
            kind: SlotKind::Attribute { name, parts },
        });
    }
}

/// Check that every value index below `value_count` is consumed exactly once.
pub(crate) fn validate(slots: &[Slot], closing: &[usize], value_count: usize) -> Result<(), TemplateError> {
    let mut seen = vec![0usize; value_count];
    let used = slots
        .iter()
        .flat_map(|slot| slot.kind.indices())
        .chain(closing.iter().copied());
    for index in used {
        match seen.get_mut(index) {
            Some(count) => *count += 1,
            None => return Err(TemplateError::InvalidPlaceholderPosition { context: "markup" }),
        }
    }
    if seen.iter().all(|count| *count == 1) {
        Ok(())
    } else {
        // A token swallowed by a position the parser keeps verbatim.
        Err(TemplateError::InvalidPlaceholderPosition { context: "markup" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse;

    fn extract(src: &str) -> (Node, Vec<Slot>) {
        let placeholders = Placeholders::with_stem("sp-t-");
        let parsed = parse(src, &placeholders).unwrap();
        let slots = extract_slots(&parsed.fragment, &placeholders);
        (parsed.fragment, slots)
    }

    #[test]
    fn test_text_slots_split_text() {
        let (fragment, slots) = extract("<p>Hello sp-t-0-, bye sp-t-1-</p>");
        assert_eq!(fragment.inner_html(), "<p>Hello <!---->, bye <!----></p>");
        assert_eq!(
            slots,
            vec![
                Slot { path: vec![0, 1], kind: SlotKind::Text { index: 0 } },
                Slot { path: vec![0, 3], kind: SlotKind::Text { index: 1 } },
            ]
        );
    }

    #[test]
    fn test_sibling_paths_follow_split() {
        let (_, slots) = extract("sp-t-0-<b>sp-t-1-</b>");
        assert_eq!(slots[0].path, vec![0]);
        assert_eq!(slots[1].path, vec![1, 0]);
    }

    #[test]
    fn test_attribute_kinds() {
        let (fragment, slots) = extract(r#"<a href="sp-t-0-" class="btn sp-t-1-" sp-t-2- title="static">x</a>"#);
        assert_eq!(fragment.inner_html(), r#"<a title="static">x</a>"#, "token attributes are stripped");
        assert_eq!(
            slots[0].kind,
            SlotKind::Attribute { name: "href".into(), parts: AttributeParts::Whole(0) }
        );
        assert_eq!(
            slots[1].kind,
            SlotKind::Attribute {
                name: "class".into(),
                parts: AttributeParts::Interpolated(vec![AttrPart::Static("btn ".into()), AttrPart::Slot(1)]),
            }
        );
        assert_eq!(slots[2].kind, SlotKind::Directive { index: 2 });
    }

    #[test]
    fn test_stand_in_slot() {
        let (_, slots) = extract("<div><sp-t-0->inner</sp-t-1-></div>");
        assert_eq!(slots, vec![Slot { path: vec![0, 0], kind: SlotKind::Child { index: 0 } }]);
    }

    #[test]
    fn test_validate_counts() {
        let slots = vec![Slot { path: vec![0], kind: SlotKind::Text { index: 0 } }];
        assert!(validate(&slots, &[1], 2).is_ok());
        assert!(validate(&slots, &[], 2).is_err(), "index 1 never consumed");
    }
}
