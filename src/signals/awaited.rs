//! Promises and the async-state signal that follows them.
//!
//! A [`Promise`] is a cloneable local future with a fallible result. An
//! [`Awaited`] exposes the settlement of the most recent promise it was given
//! as a signal of [`AsyncState`]. Each promise it tracks gets a generation
//! number; a promise that settles after a newer one was handed in is ignored.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::future::{self, AbortHandle, FutureExt, LocalBoxFuture, Shared};
use tracing::{debug, error, trace};

use super::read::{ReadSignal, Readable};
use super::runtime::{Listener, SignalId};
use super::state::Signal;
use super::subscription::{SubscribeMode, Subscription};
use crate::scheduler;

// =============================================================================
// Promise
// =============================================================================

/// A cloneable, single-threaded future resolving to `Result<T, E>`.
pub struct Promise<T, E> {
    future: Shared<LocalBoxFuture<'static, Result<T, E>>>,
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    pub fn new(future: impl Future<Output = Result<T, E>> + 'static) -> Self {
        Self {
            future: future.boxed_local().shared(),
        }
    }

    pub fn resolved(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    pub fn rejected(error: E) -> Self {
        Self::new(future::ready(Err(error)))
    }

    /// A promise settled later through the returned [`Resolver`].
    ///
    /// If the resolver is dropped without settling, the promise stays pending.
    pub fn channel() -> (Self, Resolver<T, E>) {
        let (sender, receiver) = oneshot::channel();
        let promise = Self::new(async move {
            match receiver.await {
                Ok(result) => result,
                Err(_) => future::pending().await,
            }
        });
        (promise, Resolver { sender })
    }

    /// Settled result, if the promise has already completed.
    pub fn peek(&self) -> Option<Result<T, E>> {
        self.future.peek().cloned()
    }

    fn into_future(self) -> Shared<LocalBoxFuture<'static, Result<T, E>>> {
        self.future
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// Settles a promise created with [`Promise::channel`].
pub struct Resolver<T, E> {
    sender: oneshot::Sender<Result<T, E>>,
}

impl<T, E> Resolver<T, E> {
    pub fn resolve(self, value: T) {
        let _ = self.sender.send(Ok(value));
    }

    pub fn reject(self, error: E) {
        let _ = self.sender.send(Err(error));
    }
}

// =============================================================================
// Async State
// =============================================================================

/// Settlement state of the latest tracked promise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncState<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> AsyncState<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncState::Pending)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            AsyncState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            AsyncState::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

// =============================================================================
// Awaited
// =============================================================================

/// Signal of the [`AsyncState`] of the latest promise handed in.
pub struct Awaited<T, E> {
    inner: Rc<AwaitedInner<T, E>>,
}

type ErrorHandler<E> = Rc<dyn Fn(&E)>;

struct AwaitedInner<T, E> {
    state: Signal<AsyncState<T, E>>,
    generation: Cell<u64>,
    on_error: RefCell<Option<ErrorHandler<E>>>,
    upstream: RefCell<Option<Subscription>>,
    /// Cancels the task waiting on the current promise.
    in_flight: RefCell<Option<AbortHandle>>,
}

/// Follow a single promise.
pub fn awaited<T, E>(promise: Promise<T, E>) -> Awaited<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    let awaited = Awaited::pending();
    awaited.inner.track(promise);
    awaited
}

/// Follow whichever promise `source` currently holds.
///
/// Switching to a new promise resets the state to pending; results of the
/// promises it replaced are discarded.
pub fn await_signal<T, E, S>(source: &S) -> Awaited<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
    S: Readable<Promise<T, E>> + ?Sized,
{
    let awaited = Awaited::pending();
    let weak = Rc::downgrade(&awaited.inner);
    let upstream = source.subscribe_with(
        Rc::new(move |promise: &Promise<T, E>| {
            if let Some(inner) = weak.upgrade() {
                inner.track(promise.clone());
            }
        }),
        SubscribeMode::Immediate,
    );
    *awaited.inner.upstream.borrow_mut() = Some(upstream);
    awaited
}

impl<T, E> Awaited<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    fn pending() -> Self {
        Self {
            inner: Rc::new(AwaitedInner {
                state: Signal::new(AsyncState::Pending),
                generation: Cell::new(0),
                on_error: RefCell::new(None),
                upstream: RefCell::new(None),
                in_flight: RefCell::new(None),
            }),
        }
    }

    /// Route rejections to `handler` instead of the unhandled-rejection
    /// queue.
    pub fn error(self, handler: impl Fn(&E) + 'static) -> Self {
        *self.inner.on_error.borrow_mut() = Some(Rc::new(handler));
        self
    }

    pub fn get(&self) -> AsyncState<T, E> {
        self.inner.state.get()
    }

    pub fn peek(&self) -> AsyncState<T, E> {
        self.inner.state.peek()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&AsyncState<T, E>) + 'static,
        mode: SubscribeMode,
    ) -> Subscription {
        self.inner.state.subscribe(listener, mode)
    }

    pub fn read_only(&self) -> ReadSignal<AsyncState<T, E>> {
        ReadSignal::new(self.clone())
    }
}

impl<T, E> AwaitedInner<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    fn track(self: &Rc<Self>, promise: Promise<T, E>) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        if !self.state.peek().is_pending() {
            self.state.set(AsyncState::Pending);
        }

        let weak: Weak<Self> = Rc::downgrade(self);
        let future = promise.into_future();
        let (task, handle) = future::abortable(async move {
            let result = future.await;
            if let Some(inner) = weak.upgrade() {
                inner.settle(generation, result);
            }
        });
        if let Some(previous) = self.in_flight.replace(Some(handle)) {
            trace!(generation, "cancelling wait on superseded promise");
            previous.abort();
        }
        scheduler::spawn_local(task.map(|_| ()));
    }

    fn settle(&self, generation: u64, result: Result<T, E>) {
        if generation != self.generation.get() {
            trace!(
                generation,
                current = self.generation.get(),
                "discarding result of superseded promise"
            );
            return;
        }
        match result {
            Ok(value) => {
                debug!(signal = ?self.state.id(), "promise resolved");
                self.state.set(AsyncState::Resolved(value));
            }
            Err(err) => {
                self.state.set(AsyncState::Rejected(err.clone()));
                let handler = self.on_error.borrow().clone();
                match handler {
                    Some(handler) => handler(&err),
                    None => {
                        error!(signal = ?self.state.id(), "unhandled promise rejection: {err:?}");
                        scheduler::report_unhandled_rejection(format!("{err:?}"));
                    }
                }
            }
        }
    }
}

impl<T, E> Drop for AwaitedInner<T, E> {
    fn drop(&mut self) {
        if let Some(upstream) = self.upstream.get_mut().take() {
            upstream.unsubscribe();
        }
        if let Some(task) = self.in_flight.get_mut().take() {
            task.abort();
        }
    }
}

impl<T, E> Clone for Awaited<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Readable<AsyncState<T, E>> for Awaited<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    fn get(&self) -> AsyncState<T, E> {
        Awaited::get(self)
    }

    fn peek(&self) -> AsyncState<T, E> {
        Awaited::peek(self)
    }

    fn version(&self) -> u64 {
        self.inner.state.version()
    }

    fn id(&self) -> SignalId {
        self.inner.state.id()
    }

    fn subscribe_with(&self, listener: Listener<AsyncState<T, E>>, mode: SubscribeMode) -> Subscription {
        self.inner.state.subscribe_with(listener, mode)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Awaited<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awaited")
            .field("state", &self.inner.state)
            .field("generation", &self.inner.generation.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::signal;

    #[test]
    fn test_resolves_after_tasks_run() {
        scheduler::reset_scheduler();
        let result = awaited(Promise::<i32, String>::resolved(42));
        assert_eq!(result.peek(), AsyncState::Pending, "settlement is never synchronous");

        scheduler::run_tasks();
        assert_eq!(result.peek(), AsyncState::Resolved(42));
    }

    #[test]
    fn test_superseded_promise_is_discarded() {
        scheduler::reset_scheduler();
        let (slow, slow_resolver) = Promise::<&str, String>::channel();
        let (fast, fast_resolver) = Promise::<&str, String>::channel();
        let current = signal(slow);
        let result = await_signal(&current);

        current.set(fast);
        fast_resolver.resolve("fast");
        scheduler::run_tasks();
        assert_eq!(result.peek(), AsyncState::Resolved("fast"));

        slow_resolver.resolve("slow");
        scheduler::run_tasks();
        assert_eq!(result.peek(), AsyncState::Resolved("fast"), "stale result must not win");
    }

    #[test]
    fn test_superseded_waits_do_not_pile_up() {
        scheduler::reset_scheduler();
        let (first, _first_resolver) = Promise::<i32, String>::channel();
        let current = signal(first);
        let result = await_signal(&current);
        scheduler::run_tasks();
        assert_eq!(scheduler::live_tasks(), 1);

        for _ in 0..5 {
            // Resolver dropped at once: this promise never settles.
            let (abandoned, _) = Promise::channel();
            current.set(abandoned);
        }
        scheduler::run_tasks();
        assert_eq!(scheduler::live_tasks(), 1, "only the latest promise is awaited");

        drop(result);
        scheduler::run_tasks();
        assert_eq!(scheduler::live_tasks(), 0, "dropping the signal cancels the wait");
    }

    #[test]
    fn test_new_promise_resets_to_pending() {
        scheduler::reset_scheduler();
        let current = signal(Promise::<i32, String>::resolved(1));
        let result = await_signal(&current);
        scheduler::run_tasks();
        assert_eq!(result.peek(), AsyncState::Resolved(1));

        let (next, _resolver) = Promise::channel();
        current.set(next);
        assert!(result.peek().is_pending());
    }

    #[test]
    fn test_rejection_goes_to_handler() {
        scheduler::reset_scheduler();
        let caught = Rc::new(RefCell::new(None));
        let caught_clone = caught.clone();
        let result = awaited(Promise::<i32, String>::rejected("nope".into()))
            .error(move |e| *caught_clone.borrow_mut() = Some(e.clone()));

        scheduler::run_tasks();
        assert_eq!(result.peek().error(), Some(&"nope".to_string()));
        assert_eq!(caught.borrow().as_deref(), Some("nope"));
        assert!(scheduler::take_unhandled_rejections().is_empty());
    }

    #[test]
    fn test_unhandled_rejection_is_reported() {
        scheduler::reset_scheduler();
        let _result = awaited(Promise::<i32, String>::rejected("lost".into()));
        scheduler::run_tasks();
        assert_eq!(scheduler::take_unhandled_rejections(), vec!["\"lost\"".to_string()]);
    }
}
