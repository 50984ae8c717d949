//! Host scheduler: a virtual clock with timers, plus a local task pool.
//!
//! Nothing here runs on its own. The host (or a test) drives the scheduler
//! with [`advance`], [`run_until_idle`] or [`run_tasks`].

mod tasks;
mod timers;

pub use tasks::{live_tasks, report_unhandled_rejection, run_tasks, spawn_local, take_unhandled_rejections};
pub use timers::{TimerHandle, advance, now, pending_timers, run_until_idle, set_interval, set_timeout};

/// Drop every queued timer and task and rewind the clock to zero.
pub fn reset_scheduler() {
    timers::reset_timers();
    tasks::reset_tasks();
}
