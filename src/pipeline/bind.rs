//! Hydrator - binds values into a fresh copy of a template skeleton.
//!
//! Static values are written once. Dynamic values (signals, closures) get a
//! live binding whose subscription is scoped to the mount lifetime of the
//! node that owns it: a reactive child range is owned by its start marker,
//! a reactive attribute by its element.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::dom::{Node, NodeId, NodeType, WeakNode};
use crate::error::{Error, Result};
use crate::lifecycle::on_mount;
use crate::signals::{Derived, ReadSignal, Readable, SubscribeMode, derive_memo, untracked};
use crate::template::{AttrPart, AttributeParts, SlotKind, Template, parse_template};

use super::value::Value;

/// Render a template call site.
///
/// `strings` must be a `static` slice: its address identifies the template
/// in the cache. Prefer the [`html!`](crate::html) macro, which builds one.
pub fn html(strings: &'static [&'static str], values: Vec<Value>) -> Result<Vec<Node>> {
    let template = parse_template(strings)?;
    hydrate(&template, values)
}

/// Instantiate `template` and bind `values` into its slots.
///
/// Returns the top-level nodes of the instance, detached.
pub fn hydrate(template: &Template, values: Vec<Value>) -> Result<Vec<Node>> {
    if values.len() != template.value_count() {
        return Err(Error::ValueCount {
            expected: template.value_count(),
            found: values.len(),
        });
    }
    Ok(untracked(|| bind_slots(template, values)))
}

fn bind_slots(template: &Template, values: Vec<Value>) -> Vec<Node> {
    let root = template.instantiate();
    // Paths index the pristine skeleton, so resolve all of them first.
    let targets: Vec<Option<Node>> = template.slots().iter().map(|slot| resolve(&root, &slot.path)).collect();
    let mut values: Vec<Option<Value>> = values.into_iter().map(Some).collect();

    for (slot, target) in template.slots().iter().zip(targets) {
        let Some(target) = target else {
            warn!(path = ?slot.path, "slot path does not resolve");
            continue;
        };
        match &slot.kind {
            SlotKind::Text { index } => bind_text(&target, take(&mut values, *index)),
            SlotKind::Child { index } => bind_stand_in(&target, take(&mut values, *index)),
            SlotKind::Directive { index } => bind_directive(&target, take(&mut values, *index)),
            SlotKind::Attribute { name, parts } => match parts {
                AttributeParts::Whole(index) => bind_attribute(&target, name, take(&mut values, *index)),
                AttributeParts::Interpolated(parts) => {
                    let pieces = parts
                        .iter()
                        .map(|part| match part {
                            AttrPart::Static(text) => Piece::Static(text.clone()),
                            AttrPart::Slot(index) => Piece::Value(take(&mut values, *index)),
                        })
                        .collect();
                    bind_interpolated(&target, name, pieces);
                }
            },
        }
    }

    trace!(slots = template.slot_count(), "template hydrated");
    root.children()
}

fn resolve(root: &Node, path: &[usize]) -> Option<Node> {
    path.iter().try_fold(root.clone(), |node, &index| node.child(index))
}

fn take(values: &mut [Option<Value>], index: usize) -> Value {
    values.get_mut(index).and_then(Option::take).unwrap_or_default()
}

// =============================================================================
// Child Positions
// =============================================================================

/// Render `value` into `out` as a flat node list.
pub(crate) fn render_value(value: Value, out: &mut Vec<Node>) {
    match value {
        Value::Empty => {}
        Value::Text(text) => out.push(Node::text(text)),
        Value::Bool(b) => out.push(Node::text(b.to_string())),
        Value::Node(node) if node.node_type() == NodeType::Fragment => out.extend(node.fragment_nodes()),
        Value::Node(node) => out.push(node),
        Value::List(items) => {
            for item in items {
                render_value(item, out);
            }
        }
        Value::Function(f) => bind_range(derive_memo(&f).read_only(), out),
        Value::Reactive(signal) => bind_range(signal, out),
        Value::Render(view) => render_value(view.render(), out),
        Value::Handler(_) | Value::Directive(_) => {
            warn!("handler or directive in child position renders nothing");
        }
    }
}

fn bind_text(placeholder: &Node, value: Value) {
    let mut nodes = Vec::new();
    render_value(value, &mut nodes);
    placeholder.replace_with(&nodes);
}

/// Swap a stand-in element for the rendered value, moving the stand-in's
/// children into the first rendered element.
fn bind_stand_in(stand_in: &Node, value: Value) {
    let mut nodes = Vec::new();
    render_value(value, &mut nodes);
    match nodes.iter().find(|node| node.is_element()) {
        Some(host) => {
            for child in stand_in.children() {
                host.append_child(&child);
            }
        }
        None if stand_in.child_count() > 0 => {
            warn!("stand-in value rendered no element; its children are dropped");
        }
        None => {}
    }
    stand_in.replace_with(&nodes);
}

/// A live child range: `[start, ..rendered, end]`.
fn bind_range(signal: ReadSignal<Value>, out: &mut Vec<Node>) {
    let start = Node::comment("[");
    let end = Node::comment("]");

    out.push(start.clone());
    render_value(signal.peek(), out);
    out.push(end.clone());

    let rendered = Rc::new(Cell::new(signal.version()));
    let (weak_start, weak_end) = (start.downgrade(), end.downgrade());
    on_mount(&start, move || {
        if signal.version() != rendered.get() {
            trace!("range changed while unmounted");
            update_range(&weak_start, &weak_end, &signal.peek());
            rendered.set(signal.version());
        }

        let (start, end, rendered, source) = (weak_start.clone(), weak_end.clone(), rendered.clone(), signal.clone());
        signal.subscribe(
            move |value| {
                update_range(&start, &end, value);
                rendered.set(source.version());
            },
            SubscribeMode::Lazy,
        )
    });
}

/// Reconcile the nodes between the markers with a fresh render of `value`.
/// Nodes present in both renders stay where they are when already in order.
fn update_range(start: &WeakNode, end: &WeakNode, value: &Value) {
    let (Some(start), Some(end)) = (start.upgrade(), end.upgrade()) else {
        return;
    };
    let Some(parent) = start.parent() else {
        return;
    };

    let mut fresh = Vec::new();
    untracked(|| render_value(value.clone(), &mut fresh));
    let keep: HashSet<NodeId> = fresh.iter().map(Node::id).collect();

    let mut cursor = start.next_sibling();
    while let Some(node) = cursor {
        if node == end {
            break;
        }
        cursor = node.next_sibling();
        if !keep.contains(&node.id()) {
            node.remove();
        }
    }

    let mut cursor = start.next_sibling();
    for node in &fresh {
        if cursor.as_ref() == Some(node) {
            cursor = node.next_sibling();
            continue;
        }
        parent.insert_before(node, cursor.as_ref());
    }
    trace!(nodes = fresh.len(), "range updated");
}

// =============================================================================
// Attribute Positions
// =============================================================================

enum Piece {
    Static(String),
    Value(Value),
}

/// Attribute text for a value; `None` removes the attribute. Reading a
/// signal here records a dependency.
fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Empty | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        Value::Text(text) => Some(text.clone()),
        Value::Node(node) => Some(node.text_content()),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().filter_map(attribute_text).collect();
            (!parts.is_empty()).then(|| parts.concat())
        }
        Value::Function(f) => attribute_text(&f()),
        Value::Reactive(signal) => attribute_text(&signal.get()),
        Value::Render(view) => attribute_text(&view.render()),
        Value::Handler(_) | Value::Directive(_) => None,
    }
}

fn apply_attribute(element: &Node, name: &str, text: Option<&str>) {
    match text {
        Some(text) if element.attribute(name).as_deref() != Some(text) => element.set_attribute(name, text),
        Some(_) => {}
        None => element.remove_attribute(name),
    }
}

fn bind_attribute(element: &Node, name: &str, value: Value) {
    match value {
        Value::Handler(handler) => match name.strip_prefix("on") {
            Some(event) if !event.is_empty() => {
                element.add_event_listener(event, move |e| handler(e));
            }
            _ => warn!(attribute = name, "handler bound to a non-event attribute"),
        },
        Value::Directive(_) => warn!(attribute = name, "directive in attribute-value position"),
        value if value.is_dynamic() => {
            let text = Derived::new(move || attribute_text(&value));
            bind_live_attribute(element, name, text);
        }
        value => apply_attribute(element, name, attribute_text(&value).as_deref()),
    }
}

fn bind_interpolated(element: &Node, name: &str, pieces: Vec<Piece>) {
    let dynamic = pieces
        .iter()
        .any(|piece| matches!(piece, Piece::Value(value) if value.is_dynamic()));
    let concat = move || -> String {
        pieces
            .iter()
            .map(|piece| match piece {
                Piece::Static(text) => text.clone(),
                Piece::Value(value) => attribute_text(value).unwrap_or_default(),
            })
            .collect()
    };

    if dynamic {
        bind_live_attribute(element, name, Derived::new(move || Some(concat())));
    } else {
        element.set_attribute(name, &concat());
    }
}

/// Write `text` now and keep the attribute in sync while `element` is mounted.
fn bind_live_attribute(element: &Node, name: &str, text: Derived<Option<String>>) {
    apply_attribute(element, name, text.peek().as_deref());

    let weak = element.downgrade();
    let name = name.to_string();
    on_mount(element, move || {
        if let Some(element) = weak.upgrade() {
            apply_attribute(&element, &name, text.peek().as_deref());
        }
        let (weak, name) = (weak.clone(), name.clone());
        text.subscribe(
            move |text| {
                if let Some(element) = weak.upgrade() {
                    apply_attribute(&element, &name, text.as_deref());
                }
            },
            SubscribeMode::Lazy,
        )
    });
}

fn bind_directive(element: &Node, value: Value) {
    match value {
        Value::Directive(f) => f(element),
        Value::Empty => {}
        other => warn!(value = ?other, "attribute-name slot needs a directive"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Event, body};
    use crate::lifecycle::on_unmount;
    use crate::pipeline::value::{IntoValue, directive, on};
    use crate::signals::signal;

    fn first(nodes: Result<Vec<Node>>) -> Node {
        nodes.unwrap().into_iter().next().unwrap()
    }

    #[test]
    fn test_static_text_slot() {
        static T: [&str; 2] = ["<p>Hello ", "!</p>"];
        let p = first(html(&T, vec!["world".into_value()]));
        assert_eq!(p.outer_html(), "<p>Hello world!</p>");
    }

    #[test]
    fn test_value_count_mismatch() {
        static T: [&str; 2] = ["<p>", "</p>"];
        assert_eq!(html(&T, vec![]).err(), Some(Error::ValueCount { expected: 1, found: 0 }));
    }

    #[test]
    fn test_reactive_text_updates_while_mounted() {
        static T: [&str; 2] = ["<p>", "</p>"];
        let count = signal(1);
        let p = first(html(&T, vec![count.clone().into_value()]));
        assert_eq!(p.inner_html(), "<!--[-->1<!--]-->");

        body().append_child(&p);
        count.set(2);
        assert_eq!(p.inner_html(), "<!--[-->2<!--]-->");

        p.remove();
        count.set(3);
        assert_eq!(p.inner_html(), "<!--[-->2<!--]-->", "detached ranges do not update");

        body().append_child(&p);
        assert_eq!(p.inner_html(), "<!--[-->3<!--]-->", "catches up on remount");
    }

    #[test]
    fn test_closure_child_is_live() {
        static T: [&str; 2] = ["<span>", "</span>"];
        let name = signal("a".to_string());
        let upper = name.clone();
        let span = first(html(&T, vec![(move || upper.get().to_uppercase()).into_value()]));
        body().append_child(&span);
        name.set("b".into());
        assert_eq!(span.text_content(), "B");
    }

    #[test]
    fn test_range_keeps_reused_nodes_in_place() {
        static T: [&str; 2] = ["<ul>", "</ul>"];
        let (a, b, c) = (Node::element("li"), Node::element("li"), Node::element("li"));
        let items = signal(vec![a.clone(), b.clone()]);
        let ul = first(html(&T, vec![items.clone().into_value()]));
        body().append_child(&ul);

        let removed = Rc::new(Cell::new(0));
        for node in [&a, &b] {
            let removed = removed.clone();
            on_unmount(node, move || removed.set(removed.get() + 1));
        }

        items.set(vec![b.clone(), c.clone()]);
        assert_eq!(removed.get(), 1, "only the vanished node unmounts");
        assert!(a.parent().is_none());
        assert_eq!(b.next_sibling(), Some(c.clone()));
    }

    #[test]
    fn test_fragment_value_survives_renotify() {
        static T: [&str; 2] = ["<div>", "</div>"];
        let fragment = Node::fragment();
        let (x, y) = (Node::text("x"), Node::text("y"));
        fragment.append_child(&x);
        fragment.append_child(&y);

        let content = signal(fragment);
        let div = first(html(&T, vec![content.clone().into_value()]));
        body().append_child(&div);
        assert_eq!(div.inner_html(), "<!--[-->xy<!--]-->");

        content.notify();
        assert_eq!(div.text_content(), "xy", "fragment re-renders the nodes it held");
        assert!(div.child(1).is_some_and(|node| node.ptr_eq(&x)));

        div.remove();
        content.notify();
        body().append_child(&div);
        assert_eq!(div.inner_html(), "<!--[-->xy<!--]-->", "catch-up after remount keeps them too");
    }

    #[test]
    fn test_whole_attribute_values() {
        static T: [&str; 3] = ["<input disabled=", " value=", ">"];
        let input = first(html(&T, vec![true.into_value(), ().into_value()]));
        assert_eq!(input.outer_html(), "<input disabled=\"\">");
    }

    #[test]
    fn test_reactive_and_interpolated_attributes() {
        static T: [&str; 3] = ["<div class=\"card ", "\" title=", "></div>"];
        let tone = signal("dark".to_string());
        let hidden = signal(Some("tip".to_string()));
        let div = first(html(&T, vec![tone.clone().into_value(), hidden.clone().into_value()]));
        assert_eq!(div.attribute("class").as_deref(), Some("card dark"));
        assert_eq!(div.attribute("title").as_deref(), Some("tip"));

        body().append_child(&div);
        tone.set("light".into());
        hidden.set(None);
        assert_eq!(div.attribute("class").as_deref(), Some("card light"));
        assert!(!div.has_attribute("title"), "None removes the attribute");
    }

    #[test]
    fn test_event_handler_attribute() {
        static T: [&str; 2] = ["<button onclick=", ">+</button>"];
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let button = first(html(&T, vec![on(move |_| counter.set(counter.get() + 1))]));
        button.dispatch_event(&Event::new("click"));
        button.dispatch_event(&Event::new("click"));
        assert_eq!(clicks.get(), 2);
        assert!(!button.has_attribute("onclick"));
    }

    #[test]
    fn test_directive_receives_element() {
        static T: [&str; 2] = ["<div ", "></div>"];
        let div = first(html(&T, vec![directive(|el| el.set_attribute("data-ready", "yes"))]));
        assert_eq!(div.attribute("data-ready").as_deref(), Some("yes"));
    }

    #[test]
    fn test_stand_in_moves_children() {
        static T: [&str; 3] = ["<div><", "><b>inner</b></", "></div>"];
        let div = first(html(&T, vec![Node::element("section").into_value(), Value::Empty]));
        assert_eq!(div.outer_html(), "<div><section><b>inner</b></section></div>");
    }
}
