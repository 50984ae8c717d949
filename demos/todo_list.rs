//! Todo list - keyed lists, branches, async loading and a debounced search.

use std::time::Duration;

use spark_html::{
    Component, Event, IntoValue, Promise, ReadSignal, Signal, Value, WhenOptions, awaited, defer, derived, dom,
    each, html, mount_to_body, on, scheduler, signal, switch, when,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct Todo {
    id: u32,
    title: String,
    done: bool,
}

impl Todo {
    fn new(id: u32, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Filter {
    All,
    Active,
    Done,
}

fn todo_row(todo: ReadSignal<Todo>, todos: Signal<Vec<Todo>>) -> Value {
    let id = todo.peek().id;
    let toggle = on(move |_| {
        todos.update(|list| {
            if let Some(item) = list.iter_mut().find(|item| item.id == id) {
                item.done = !item.done;
            }
        })
    });
    let class = {
        let todo = todo.clone();
        move || if todo.get().done { "done" } else { "open" }
    };
    let title = move || todo.get().title;

    html!("<li class=" {class} "><input type=\"checkbox\" onchange=" {toggle} ">" {title} "</li>").into_value()
}

fn main() -> spark_html::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let todos = signal(vec![Todo::new(1, "parse templates"), Todo::new(2, "bind signals")]);
    let filter = signal(Filter::All);
    let query = signal(String::new());

    let visible = {
        let (todos, filter) = (todos.clone(), filter.clone());
        derived(move || {
            let filter = filter.get();
            todos
                .get()
                .into_iter()
                .filter(|todo| match filter {
                    Filter::All => true,
                    Filter::Active => !todo.done,
                    Filter::Done => todo.done,
                })
                .collect::<Vec<_>>()
        })
    };

    let rows = {
        let todos = todos.clone();
        each(visible)
            .key(|todo| todo.id)
            .map(move |todo, _index| todo_row(todo, todos.clone()))
    };

    let heading = switch(&filter)
        .case(Filter::All, || "Everything".into_value())
        .case(Filter::Active, || "Still to do".into_value())
        .default(|| "Finished".into_value());

    let (promise, resolver) = Promise::<Vec<Todo>, String>::channel();
    let remote = awaited(promise).error(|err| warn!(%err, "sync failed"));
    let sync_status = when(
        remote,
        WhenOptions::new(|synced: Vec<Todo>| format!("synced {} todos", synced.len()).into_value())
            .pending(|| "syncing...".into_value()),
    );

    let settled_query = defer(&query, Duration::from_millis(150));

    let app = Component::new("todo-app");
    app.append(html!(
        "<h1>" {heading} "</h1>"
        "<p class=\"status\">" {sync_status} "</p>"
        "<p class=\"search\">Searching for: " {settled_query} "</p>"
        "<ul>" {rows} "</ul>"
    ));
    app.watch(&todos, |list: &Vec<Todo>| {
        let open = list.iter().filter(|todo| !todo.done).count();
        info!(total = list.len(), open, "todos changed");
    });
    let handle = mount_to_body(&app);

    todos.update(|list| list.push(Todo::new(3, "write demos")));
    if let Some(checkbox) = app.content().find_by_tag("input") {
        checkbox.dispatch_event(&Event::new("change"));
    }
    filter.set(Filter::Active);

    for text in ["s", "si", "sig"] {
        query.set(text.to_string());
        scheduler::advance(Duration::from_millis(50));
    }
    scheduler::set_timeout(Duration::from_millis(200), move || {
        resolver.resolve(vec![Todo::new(10, "from the server")]);
    });
    scheduler::advance(Duration::from_millis(500));

    println!("{}", dom::body().inner_html());
    handle.unmount();
    Ok(())
}
