//! Lifecycle Tracker - per-node mount/unmount callbacks.
//!
//! A node is *mounted* while it is connected to the live document. The
//! tracker is the document's mutation observer: it is installed on first use
//! and never removed. On every insertion it walks the inserted subtree
//! (shadow roots included) and mounts tracked nodes that are now connected;
//! on every removal it unmounts tracked nodes that are no longer connected.
//!
//! - mount callbacks run in registration order, on every mount
//! - a mount callback may return a cleanup, run at the next unmount
//! - unmount callbacks run on every mounted -> unmounted transition
//!
//! No callback runs while tracker state is borrowed, so callbacks may freely
//! register more callbacks or move nodes around.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::dom::{self, Mutation, Node, NodeId, WeakNode};
use crate::signals::{Derived, SubscribeMode, Subscription};

bitflags::bitflags! {
    /// Mount state of a tracked node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LifecycleFlags: u8 {
        const MOUNTED = 1 << 0;
        const EVER_MOUNTED = 1 << 1;
    }
}

/// Deferred teardown returned by a mount callback.
pub type Cleanup = Box<dyn FnOnce()>;

type MountCallback = Rc<dyn Fn() -> Option<Cleanup>>;
type UnmountCallback = Rc<dyn Fn()>;

/// Anything a mount callback may return.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

impl IntoCleanup for Subscription {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(Box::new(move || self.unsubscribe()))
    }
}

impl IntoCleanup for Vec<Subscription> {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(Box::new(move || self.iter().for_each(Subscription::unsubscribe)))
    }
}

/// Box a closure as a [`Cleanup`].
pub fn cleanup(f: impl FnOnce() + 'static) -> Cleanup {
    Box::new(f)
}

// =============================================================================
// Tracker State
// =============================================================================

struct Record {
    node: WeakNode,
    flags: LifecycleFlags,
    mount: Vec<MountCallback>,
    cleanups: Vec<Cleanup>,
    unmount: Vec<UnmountCallback>,
}

const MIN_PRUNE_THRESHOLD: usize = 64;

thread_local! {
    static RECORDS: RefCell<HashMap<NodeId, Record>> = RefCell::new(HashMap::new());
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
    static PRUNE_AT: Cell<usize> = const { Cell::new(MIN_PRUNE_THRESHOLD) };
}

fn ensure_installed() {
    if INSTALLED.with(Cell::get) {
        return;
    }
    INSTALLED.with(|installed| installed.set(true));
    if !dom::set_observer(handle_mutation) {
        debug!("mutation observer slot already taken; lifecycle tracking is inert");
    }
}

/// Get or create the record for `node`. A new record for an already
/// connected node starts out mounted.
fn with_record<R>(node: &Node, f: impl FnOnce(&mut Record) -> R) -> R {
    ensure_installed();
    RECORDS.with(|records| {
        let mut records = records.borrow_mut();
        if !records.contains_key(&node.id()) {
            prune(&mut records);
        }
        let record = records.entry(node.id()).or_insert_with(|| {
            let flags = if node.is_connected() {
                LifecycleFlags::MOUNTED | LifecycleFlags::EVER_MOUNTED
            } else {
                LifecycleFlags::empty()
            };
            Record {
                node: node.downgrade(),
                flags,
                mount: Vec::new(),
                cleanups: Vec::new(),
                unmount: Vec::new(),
            }
        });
        f(record)
    })
}

/// Drop records whose node is gone.
fn prune(records: &mut HashMap<NodeId, Record>) {
    let threshold = PRUNE_AT.with(Cell::get);
    if records.len() < threshold {
        return;
    }
    let before = records.len();
    records.retain(|_, record| record.node.is_alive());
    trace!(before, after = records.len(), "pruned lifecycle records");
    PRUNE_AT.with(|at| at.set((records.len() * 2).max(MIN_PRUNE_THRESHOLD)));
}

fn flags_of(id: NodeId) -> Option<LifecycleFlags> {
    RECORDS.with(|records| records.borrow().get(&id).map(|r| r.flags))
}

// =============================================================================
// Transitions
// =============================================================================

fn handle_mutation(mutation: Mutation<'_>) {
    if RECORDS.with(|records| records.borrow().is_empty()) {
        return;
    }
    match mutation {
        Mutation::Inserted(root) => {
            for node in root.descendants(true) {
                if node.is_connected() {
                    mount(&node);
                }
            }
        }
        Mutation::Removed(root) => {
            for node in root.descendants(true) {
                if !node.is_connected() {
                    unmount(&node);
                }
            }
        }
    }
}

fn mount(node: &Node) {
    let callbacks = RECORDS.with(|records| {
        let mut records = records.borrow_mut();
        let record = records.get_mut(&node.id())?;
        if record.flags.contains(LifecycleFlags::MOUNTED) {
            return None;
        }
        record.flags |= LifecycleFlags::MOUNTED | LifecycleFlags::EVER_MOUNTED;
        Some(record.mount.clone())
    });
    let Some(callbacks) = callbacks else {
        return;
    };
    debug!(node = ?node, callbacks = callbacks.len(), "mounted");

    for callback in callbacks {
        if !is_mounted(node) {
            break;
        }
        run_mount_callback(node, &callback);
    }
}

fn run_mount_callback(node: &Node, callback: &MountCallback) {
    let Some(cleanup) = callback() else {
        return;
    };
    let pending = RECORDS.with(|records| {
        let mut records = records.borrow_mut();
        match records.get_mut(&node.id()) {
            Some(record) if record.flags.contains(LifecycleFlags::MOUNTED) => {
                record.cleanups.push(cleanup);
                None
            }
            _ => Some(cleanup),
        }
    });
    // Unmounted (or cleared) by its own mount callback.
    if let Some(cleanup) = pending {
        cleanup();
    }
}

fn unmount(node: &Node) {
    let work = RECORDS.with(|records| {
        let mut records = records.borrow_mut();
        let record = records.get_mut(&node.id())?;
        if !record.flags.contains(LifecycleFlags::MOUNTED) {
            return None;
        }
        record.flags.remove(LifecycleFlags::MOUNTED);
        Some((std::mem::take(&mut record.cleanups), record.unmount.clone()))
    });
    let Some((cleanups, callbacks)) = work else {
        return;
    };
    debug!(node = ?node, cleanups = cleanups.len(), "unmounted");

    for cleanup in cleanups {
        cleanup();
    }
    for callback in callbacks {
        callback();
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Run `callback` every time `node` is mounted.
///
/// A node is mounted when it becomes connected to the live document,
/// including through an ancestor or a shadow root. If the node is already
/// mounted the callback runs now, before `on_mount` returns.
///
/// # Arguments
///
/// * `node` - The node to watch
/// * `callback` - Runs on each mount; may return a cleanup (`()`, a
///   [`Cleanup`], an `Option<Cleanup>` or a [`Subscription`])
///
/// # Returns
///
/// Nothing. The cleanup a run returns is called at the next unmount; if the
/// callback unmounted its own node, the cleanup runs right away.
///
/// # Example
///
/// ```ignore
/// let clock = Node::element("time");
/// on_mount(&clock, move || {
///     let ticker = scheduler::set_interval(Duration::from_secs(1), tick);
///     cleanup(move || ticker.clear())
/// });
///
/// body().append_child(&clock); // interval starts
/// clock.remove();              // interval cleared
/// ```
pub fn on_mount<C: IntoCleanup>(node: &Node, callback: impl Fn() -> C + 'static) {
    let callback: MountCallback = Rc::new(move || callback().into_cleanup());
    let mounted = with_record(node, |record| {
        record.mount.push(callback.clone());
        record.flags.contains(LifecycleFlags::MOUNTED)
    });
    if mounted {
        run_mount_callback(node, &callback);
    }
}

/// Run `callback` every time `node` goes from mounted to unmounted.
///
/// Registering on an unmounted node never fires immediately.
pub fn on_unmount(node: &Node, callback: impl Fn() + 'static) {
    with_record(node, |record| record.unmount.push(Rc::new(callback)));
}

/// Run `f` while `node` is mounted, re-running it whenever a signal it read
/// on its previous run changes.
///
/// The effect stops at unmount and starts again, with a fresh run, at the
/// next mount. Dependencies are rediscovered on every run.
///
/// # Example
///
/// ```ignore
/// let title = signal("Inbox".to_string());
/// let heading = Node::element("h1");
/// let (t, h) = (title.clone(), heading.clone());
/// effect(&heading, move || h.set_text_content(&t.get()));
///
/// body().append_child(&heading);
/// title.set("Archive".into()); // heading text follows while mounted
/// ```
pub fn effect(node: &Node, f: impl Fn() + 'static) {
    let f: Rc<dyn Fn()> = Rc::new(f);
    on_mount(node, move || {
        let runner = Derived::from_rc(f.clone());
        runner.subscribe(|_| {}, SubscribeMode::Lazy)
    });
}

/// Forget every callback registered for `node`. Pending cleanups are
/// dropped without running.
pub fn clear(node: &Node) {
    RECORDS.with(|records| {
        records.borrow_mut().remove(&node.id());
    });
}

/// Whether the tracker considers `node` mounted.
pub fn is_mounted(node: &Node) -> bool {
    flags_of(node.id()).map_or_else(|| node.is_connected(), |f| f.contains(LifecycleFlags::MOUNTED))
}

/// Lifecycle flags of a tracked node; empty for untracked nodes.
pub fn lifecycle_flags(node: &Node) -> LifecycleFlags {
    flags_of(node.id()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::body;
    use crate::signals::signal;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    #[test]
    fn test_mount_fires_on_insert_and_cleanup_on_remove() {
        let node = Node::element("div");
        let (mounts, mounts_clone) = counter();
        let (cleanups, cleanups_clone) = counter();

        on_mount(&node, move || {
            mounts_clone.set(mounts_clone.get() + 1);
            let cleanups = cleanups_clone.clone();
            cleanup(move || cleanups.set(cleanups.get() + 1))
        });
        assert_eq!(mounts.get(), 0, "detached node is not mounted");

        body().append_child(&node);
        assert_eq!(mounts.get(), 1);
        node.remove();
        assert_eq!(cleanups.get(), 1);

        node.remove();
        assert_eq!(cleanups.get(), 1, "cleanup runs once per unmount");
    }

    #[test]
    fn test_on_mount_runs_immediately_when_mounted() {
        let node = Node::element("div");
        body().append_child(&node);
        let (mounts, mounts_clone) = counter();

        on_mount(&node, move || mounts_clone.set(mounts_clone.get() + 1));
        assert_eq!(mounts.get(), 1);
        node.remove();
    }

    #[test]
    fn test_nested_nodes_and_moves() {
        let outer = Node::element("section");
        let inner = Node::element("p");
        outer.append_child(&inner);

        let log = Rc::new(RefCell::new(Vec::new()));
        let (mount_log, unmount_log) = (log.clone(), log.clone());
        on_mount(&inner, move || mount_log.borrow_mut().push("mount"));
        on_unmount(&inner, move || unmount_log.borrow_mut().push("unmount"));

        body().append_child(&outer);
        let other = Node::element("div");
        body().append_child(&other);
        other.append_child(&outer);

        assert_eq!(*log.borrow(), vec!["mount", "unmount", "mount"], "a move unmounts then re-mounts");
        assert!(lifecycle_flags(&inner).contains(LifecycleFlags::EVER_MOUNTED));
        other.remove();
    }

    #[test]
    fn test_on_unmount_not_fired_at_registration() {
        let node = Node::element("div");
        let (hits, hits_clone) = counter();
        on_unmount(&node, move || hits_clone.set(hits_clone.get() + 1));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_cleanup_runs_immediately_when_callback_unmounts() {
        let node = Node::element("div");
        let (cleanups, cleanups_clone) = counter();
        let node_clone = node.clone();
        on_mount(&node, move || {
            node_clone.remove();
            let cleanups = cleanups_clone.clone();
            cleanup(move || cleanups.set(cleanups.get() + 1))
        });

        body().append_child(&node);
        assert_eq!(cleanups.get(), 1);
        assert!(!is_mounted(&node));
    }

    #[test]
    fn test_shadow_content_mounts_with_host() {
        let host = Node::element("x-widget");
        let shadow = host.attach_shadow().expect("element");
        let inner = Node::element("span");
        shadow.append_child(&inner);
        let (mounts, mounts_clone) = counter();
        on_mount(&inner, move || mounts_clone.set(mounts_clone.get() + 1));

        body().append_child(&host);
        assert_eq!(mounts.get(), 1);
        host.remove();
        assert!(!is_mounted(&inner));
    }

    #[test]
    fn test_effect_follows_mount_lifetime() {
        let node = Node::element("div");
        let count = signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (count_clone, seen_clone) = (count.clone(), seen.clone());
        effect(&node, move || seen_clone.borrow_mut().push(count_clone.get()));

        count.set(1);
        assert!(seen.borrow().is_empty(), "effect waits for mount");

        body().append_child(&node);
        count.set(2);
        node.remove();
        count.set(3);

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(count.listener_count(), 0, "effect released its dependency");
    }

    #[test]
    fn test_clear_drops_callbacks() {
        let node = Node::element("div");
        let (mounts, mounts_clone) = counter();
        on_mount(&node, move || mounts_clone.set(mounts_clone.get() + 1));
        clear(&node);

        body().append_child(&node);
        assert_eq!(mounts.get(), 0);
        node.remove();
    }
}
