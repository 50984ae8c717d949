//! Counter - a button, a derived value and an interval on the virtual clock.
//!
//! Run with `RUST_LOG=spark_html=debug` to watch bindings mount and update.

use std::time::Duration;

use spark_html::{Event, derived, dom, html, mount_to_body, on, scheduler, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> spark_html::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let count = signal(0);
    let doubled = {
        let count = count.clone();
        derived(move || count.get() * 2)
    };
    let increment = {
        let count = count.clone();
        on(move |_| count.update(|n| *n += 1))
    };
    let parity = {
        let count = count.clone();
        move || if count.get() % 2 == 0 { "even" } else { "odd" }
    };

    let view = html!(
        "<div class=\"counter\">"
            "<button onclick=" {increment} ">+1</button>"
            "<p class=\"count " {parity} "\">Count: " {count.clone()} "</p>"
            "<p>Doubled: " {doubled} "</p>"
        "</div>"
    )?;
    let handle = mount_to_body(view);
    info!(html = %dom::body().inner_html(), "mounted");

    if let Some(button) = dom::body().find_by_tag("button") {
        for _ in 0..3 {
            button.dispatch_event(&Event::new("click"));
        }
    }
    info!(count = count.peek(), "after three clicks");

    let ticker = {
        let count = count.clone();
        scheduler::set_interval(Duration::from_millis(250), move || count.update(|n| *n += 10))
    };
    scheduler::advance(Duration::from_secs(1));
    ticker.clear();
    info!(count = count.peek(), now = ?scheduler::now(), "after one virtual second");

    println!("{}", dom::body().inner_html());
    handle.unmount();
    Ok(())
}
