//! Local task queue backed by a single-threaded futures pool.

use std::cell::{Cell, RefCell};
use std::future::Future;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use tracing::{trace, warn};

struct TaskQueue {
    pool: Option<LocalPool>,
    spawner: LocalSpawner,
}

impl TaskQueue {
    fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: Some(pool),
            spawner,
        }
    }
}

thread_local! {
    static TASKS: RefCell<TaskQueue> = RefCell::new(TaskQueue::new());
    static UNHANDLED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static LIVE: Cell<usize> = const { Cell::new(0) };
}

/// Counts a spawned task until its future completes or is dropped.
struct LiveTask;

impl LiveTask {
    fn enter() -> Self {
        LIVE.with(|live| live.set(live.get() + 1));
        Self
    }
}

impl Drop for LiveTask {
    fn drop(&mut self) {
        LIVE.with(|live| live.set(live.get().saturating_sub(1)));
    }
}

/// Queue a future on the local pool. It first runs at the next
/// [`run_tasks`], [`advance`](super::advance) or
/// [`run_until_idle`](super::run_until_idle).
pub fn spawn_local(future: impl Future<Output = ()> + 'static) {
    let spawner = TASKS.with(|tasks| tasks.borrow().spawner.clone());
    let live = LiveTask::enter();
    let counted = async move {
        let _live = live;
        future.await;
    };
    if let Err(err) = spawner.spawn_local(counted) {
        warn!("failed to spawn local task: {err}");
    }
}

/// Poll every queued task until none can make progress.
///
/// A call made from inside a running task returns immediately; the outer
/// call picks up whatever was queued.
pub fn run_tasks() {
    let Some(pool) = TASKS.with(|tasks| tasks.borrow_mut().pool.take()) else {
        trace!("run_tasks re-entered; deferring to the outer drain");
        return;
    };
    let mut restore = PoolRestore(Some(pool));
    if let Some(pool) = restore.0.as_mut() {
        pool.run_until_stalled();
    }
}

/// Puts the pool back even if a task panics.
struct PoolRestore(Option<LocalPool>);

impl Drop for PoolRestore {
    fn drop(&mut self) {
        if let Some(pool) = self.0.take() {
            TASKS.with(|tasks| tasks.borrow_mut().pool = Some(pool));
        }
    }
}

/// Number of spawned tasks that have not finished yet.
pub fn live_tasks() -> usize {
    LIVE.with(Cell::get)
}

/// Record a rejected promise nobody handled.
pub fn report_unhandled_rejection(message: String) {
    UNHANDLED.with(|queue| queue.borrow_mut().push(message));
}

/// Drain the unhandled rejection queue.
pub fn take_unhandled_rejections() -> Vec<String> {
    UNHANDLED.with(|queue| std::mem::take(&mut *queue.borrow_mut()))
}

pub(crate) fn reset_tasks() {
    TASKS.with(|tasks| *tasks.borrow_mut() = TaskQueue::new());
    UNHANDLED.with(|queue| queue.borrow_mut().clear());
}
