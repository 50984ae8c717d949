//! Virtual-clock timers.
//!
//! Time only moves when the host calls [`advance`]. Timers due at the same
//! instant fire in creation order. Local tasks are drained before each timer,
//! the same way microtasks run before the next macrotask.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use super::tasks;

/// Shortest interval period; a zero period would never let time advance.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

enum TimerCallback {
    Once(Box<dyn FnOnce()>),
    Repeating(Rc<dyn Fn()>, Duration),
}

#[derive(Default)]
struct TimerQueue {
    now: Duration,
    next_id: u64,
    /// (deadline, id) -> callback
    entries: BTreeMap<(Duration, u64), TimerCallback>,
    deadlines: HashMap<u64, Duration>,
    /// Interval currently executing, and whether it was cleared meanwhile.
    running: Option<(u64, bool)>,
}

thread_local! {
    static TIMERS: RefCell<TimerQueue> = RefCell::new(TimerQueue::default());
}

/// Handle to a scheduled timeout or interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
}

impl TimerHandle {
    /// Cancel the timer. Clearing a fired or cleared timer does nothing.
    pub fn clear(self) {
        TIMERS.with(|timers| {
            let mut timers = timers.borrow_mut();
            if let Some(deadline) = timers.deadlines.remove(&self.id) {
                timers.entries.remove(&(deadline, self.id));
            } else if let Some((id, cleared)) = timers.running.as_mut() {
                if *id == self.id {
                    *cleared = true;
                }
            }
        });
    }

    /// Whether the timer is still waiting to fire.
    pub fn is_pending(self) -> bool {
        TIMERS.with(|timers| timers.borrow().deadlines.contains_key(&self.id))
    }
}

fn schedule(delay: Duration, callback: TimerCallback) -> TimerHandle {
    TIMERS.with(|timers| {
        let mut timers = timers.borrow_mut();
        timers.next_id += 1;
        let id = timers.next_id;
        let deadline = timers.now + delay;
        timers.entries.insert((deadline, id), callback);
        timers.deadlines.insert(id, deadline);
        TimerHandle { id }
    })
}

/// Run `callback` once, `delay` after the current virtual time.
pub fn set_timeout(delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
    schedule(delay, TimerCallback::Once(Box::new(callback)))
}

/// Run `callback` every `period` until the handle is cleared.
pub fn set_interval(period: Duration, callback: impl Fn() + 'static) -> TimerHandle {
    let period = period.max(MIN_INTERVAL);
    schedule(period, TimerCallback::Repeating(Rc::new(callback), period))
}

/// Current virtual time.
pub fn now() -> Duration {
    TIMERS.with(|timers| timers.borrow().now)
}

/// Number of timers waiting to fire.
pub fn pending_timers() -> usize {
    TIMERS.with(|timers| timers.borrow().entries.len())
}

/// Pop and run the earliest timer due at or before `limit`.
fn fire_next(limit: Duration) -> bool {
    let due = TIMERS.with(|timers| {
        let mut timers = timers.borrow_mut();
        let (&(deadline, id), _) = timers.entries.first_key_value()?;
        if deadline > limit {
            return None;
        }
        let callback = timers.entries.remove(&(deadline, id))?;
        timers.deadlines.remove(&id);
        timers.now = timers.now.max(deadline);
        if matches!(callback, TimerCallback::Repeating(..)) {
            timers.running = Some((id, false));
        }
        Some((id, callback))
    });

    let Some((id, callback)) = due else {
        return false;
    };
    trace!(timer = id, "firing timer");

    match callback {
        TimerCallback::Once(f) => f(),
        TimerCallback::Repeating(f, period) => {
            f();
            TIMERS.with(|timers| {
                let mut timers = timers.borrow_mut();
                let cleared = matches!(timers.running.take(), Some((_, true)));
                if !cleared {
                    let deadline = timers.now + period;
                    timers.entries.insert((deadline, id), TimerCallback::Repeating(f, period));
                    timers.deadlines.insert(id, deadline);
                }
            });
        }
    }
    true
}

/// Move the virtual clock forward by `by`, running tasks and every timer
/// that comes due, in deadline order.
pub fn advance(by: Duration) {
    let target = now() + by;
    loop {
        tasks::run_tasks();
        if !fire_next(target) {
            break;
        }
    }
    TIMERS.with(|timers| {
        let mut timers = timers.borrow_mut();
        timers.now = timers.now.max(target);
    });
    tasks::run_tasks();
}

/// Run pending tasks and every timer already due at the current time.
pub fn run_until_idle() {
    let current = now();
    loop {
        tasks::run_tasks();
        if !fire_next(current) {
            break;
        }
    }
}

pub(crate) fn reset_timers() {
    TIMERS.with(|timers| *timers.borrow_mut() = TimerQueue::default());
}
