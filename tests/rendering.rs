//! Templates, bindings and lifecycle against the live document.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_html::dom::{Event, Node, body};
use spark_html::lifecycle::is_mounted;
use spark_html::{
    Component, Error, IntoValue, TemplateError, Value, cleanup, each, html, mount_to_body, on, on_mount, on_unmount,
    parse_template, signal, switch,
};

fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let count = Rc::new(Cell::new(0));
    let inc = count.clone();
    (count, move || inc.set(inc.get() + 1))
}

#[test]
fn on_mount_runs_synchronously_for_connected_nodes_and_cleans_up_once() {
    let node = Node::element("div");
    body().append_child(&node);

    let (mounts, mount) = counter();
    let cleanups = Rc::new(Cell::new(0));
    let cleaned = cleanups.clone();
    on_mount(&node, move || {
        mount();
        let cleaned = cleaned.clone();
        cleanup(move || cleaned.set(cleaned.get() + 1))
    });
    assert_eq!(mounts.get(), 1, "already connected: runs during registration");

    node.remove();
    assert_eq!(cleanups.get(), 1);
    let detached = Node::element("section");
    detached.append_child(&node);
    detached.remove();
    assert_eq!(cleanups.get(), 1, "cleanup ran exactly once");
}

#[test]
fn moving_a_mounted_node_unmounts_then_remounts() {
    let (left, right) = (Node::element("div"), Node::element("div"));
    body().append_child(&left);
    body().append_child(&right);
    let item = Node::element("p");
    left.append_child(&item);

    let log = Rc::new(RefCell::new(Vec::new()));
    let (on_in, on_out) = (log.clone(), log.clone());
    on_mount(&item, move || on_in.borrow_mut().push("mount"));
    on_unmount(&item, move || on_out.borrow_mut().push("unmount"));

    right.append_child(&item);
    assert_eq!(*log.borrow(), vec!["mount", "unmount", "mount"]);
    assert!(is_mounted(&item));
}

#[test]
fn nested_nodes_mount_with_their_ancestor() {
    let outer = Node::element("div");
    let inner = Node::element("span");
    outer.append_child(&inner);
    let (mounts, mount) = counter();
    on_mount(&inner, move || mount());

    body().append_child(&outer);
    assert_eq!(mounts.get(), 1);
    assert!(is_mounted(&inner));
}

#[test]
fn same_call_site_shares_one_skeleton() {
    fn greeting(name: &str) -> Vec<Node> {
        html!("<p class=\"hi\">Hello " {name.to_string()} "</p>").unwrap()
    }
    let a = greeting("ada");
    let b = greeting("grace");
    assert_eq!(a[0].outer_html(), "<p class=\"hi\">Hello ada</p>");
    assert_eq!(b[0].outer_html(), "<p class=\"hi\">Hello grace</p>");
    assert!(!a[0].ptr_eq(&b[0]), "each render clones the skeleton");

    static SITE: [&str; 2] = ["<p class=\"hi\">Hello ", "</p>"];
    let first = parse_template(&SITE).unwrap();
    let second = parse_template(&SITE).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn malformed_templates_fail_at_render_call() {
    let result = html!("<div><span>" {1} "</div>");
    assert!(matches!(
        result,
        Err(Error::Template(TemplateError::MismatchedClosingTag { .. }))
    ));
}

#[test]
fn reactive_slot_preserves_siblings() {
    let name = signal("ada".to_string());
    let handle = mount_to_body(html!("<p><b>static</b>" {name.clone()} "<i>tail</i></p>"));
    let p = handle.nodes()[0].clone();
    let bold = p.first_child().unwrap();
    let italic = p.last_child().unwrap();

    name.set("grace".into());
    assert_eq!(p.text_content(), "staticgracetail");
    assert!(p.first_child().unwrap().ptr_eq(&bold));
    assert!(p.last_child().unwrap().ptr_eq(&italic));
    handle.unmount();
}

#[test]
fn interpolated_attribute_concatenates() {
    let size = signal(2);
    let handle = mount_to_body(html!("<div class=\"box size-" {size.clone()} " " {"rounded"} "\"></div>"));
    let div = handle.nodes()[0].clone();
    assert_eq!(div.attribute("class").as_deref(), Some("box size-2 rounded"));
    size.set(3);
    assert_eq!(div.attribute("class").as_deref(), Some("box size-3 rounded"));
    assert_eq!(div.child_count(), 0, "interpolations never splice nodes");
}

#[test]
fn click_handler_updates_bound_text() {
    let count = signal(0);
    let increment = {
        let count = count.clone();
        on(move |_| count.update(|n| *n += 1))
    };
    let handle = mount_to_body(html!("<button onclick=" {increment} ">" {count.clone()} "</button>"));
    let button = handle.nodes()[0].clone();

    button.dispatch_event(&Event::new("click"));
    button.dispatch_event(&Event::new("click"));
    assert_eq!(button.text_content(), "2");
}

#[test]
fn each_list_keeps_rows_across_updates() {
    let items = signal(vec![1, 2, 3]);
    let rows = each(&items).map(|item, index| {
        html!("<li data-index=" {index} ">" {item} "</li>").into_value()
    });
    let handle = mount_to_body(html!("<ul>" {rows} "</ul>"));
    let ul = handle.nodes()[0].clone();
    let first_row = ul.find_by_tag("li").unwrap();

    let (unmounts, unmount) = counter();
    on_unmount(&first_row, move || unmount());

    items.set(vec![0, 1, 2, 3]);
    let rows: Vec<Node> = ul.find_all_by_tag("li");
    assert_eq!(rows.len(), 4);
    assert_eq!(ul.text_content(), "0123");
    assert!(rows[1].ptr_eq(&first_row), "row for 1 is reused");
    assert_eq!(first_row.attribute("data-index").as_deref(), Some("1"), "index signal updated");
    assert_eq!(unmounts.get(), 0, "kept rows are never unmounted");

    items.set(vec![2]);
    assert_eq!(ul.text_content(), "2");
    assert_eq!(unmounts.get(), 1);
}

#[test]
fn switch_swaps_branch_content() {
    let logged_in = signal(false);
    let view = switch(&logged_in)
        .case(true, || html!("<p>Welcome back</p>").into_value())
        .default(|| html!("<button>Log in</button>").into_value());
    let host = Node::element("main");
    body().append_child(&host);
    let _handle = spark_html::mount(&host, view);

    assert!(host.find_by_tag("button").is_some());
    logged_in.set(true);
    assert!(host.find_by_tag("button").is_none());
    assert_eq!(host.find_by_tag("p").map(|p| p.text_content()).as_deref(), Some("Welcome back"));
}

#[test]
fn component_as_stand_in_receives_children() {
    let card = Component::new("sp-card");
    let handle = mount_to_body(html!("<section><" {&card} "><h2>Title</h2></" {()} "></section>"));
    let section = handle.nodes()[0].clone();
    assert_eq!(section.inner_html(), "<sp-card><h2>Title</h2></sp-card>");
    assert!(card.is_mounted());
}

#[test]
fn empty_and_false_values_remove_attributes() {
    let hidden = signal(true);
    let handle = mount_to_body(html!("<div hidden=" {hidden.clone()} " title=" {Value::Empty} "></div>"));
    let div = handle.nodes()[0].clone();
    assert_eq!(div.attribute("hidden").as_deref(), Some(""));
    assert!(!div.has_attribute("title"));
    hidden.set(false);
    assert!(!div.has_attribute("hidden"));
}
