//! Lifecycle Controller - A lock-free start/stop state machine for active objects.
//!
//! This module contains the [`Lifecycle`] controller. The current state is an immutable
//! snapshot held in a single atomically swapped cell: every operation reads the snapshot,
//! computes the next one, and compare-and-swaps it in, retrying when another thread won
//! the race. No lock is taken on any path, and the request accounting ([`begin`][Lifecycle::begin]
//! and [`end`][Lifecycle::end]) never blocks.
//!
//! The user supplied [`Actions`] run on the thread performing the transition: the caller for
//! the synchronous transitions, or the configured [`Executor`] for the asynchronous ones.

use std::hint;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::instrument;

use crate::error::{ActionError, Error};
use crate::executor::{DedicatedExecutor, Executor};
use crate::latch::Latch;
use crate::state::State;
use crate::status::Status;
use crate::LIFECYCLE_LOG_TARGET;

/// An action run on a lifecycle transition.
pub type Action = Box<dyn Fn() -> Result<(), ActionError> + Send + Sync + 'static>;

/// The actions run on the lifecycle transitions. Any of them may be absent.
///
/// - `on_start`: run when the object is started. If it fails, the start is aborted.
/// - `on_abort`: run when `on_start` failed, or returned after a forced stop.
/// - `on_stop`: run when the object is stopped.
///
/// Failures of `on_abort` and `on_stop` are logged and discarded, the object always reaches `off`.
#[derive(Default)]
pub struct Actions {
    on_start: Option<Action>,
    on_abort: Option<Action>,
    on_stop: Option<Action>,
}

impl Actions {
    /// Sets the action run when the object starts. A failure aborts the start.
    #[must_use]
    pub fn on_start<F>(mut self, action: F) -> Self
    where
        F: Fn() -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.on_start = Some(Box::new(action));
        self
    }

    /// Sets the action releasing what `on_start` acquired, when the start does not complete.
    #[must_use]
    pub fn on_abort<F>(mut self, action: F) -> Self
    where
        F: Fn() -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.on_abort = Some(Box::new(action));
        self
    }

    /// Sets the action run when the object stops, once the requests in flight are drained.
    #[must_use]
    pub fn on_stop<F>(mut self, action: F) -> Self
    where
        F: Fn() -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.on_stop = Some(Box::new(action));
        self
    }
}

impl std::fmt::Debug for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actions")
            .field("on_start", &self.on_start.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// The lifecycle controller of an active object.
///
/// Cloning the controller is cheap, all the clones share the same state.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    /// Creates a controller without support for asynchronous transitions.
    #[must_use]
    pub fn new(actions: Actions) -> Self {
        Self::build(actions, None)
    }

    /// Creates a controller running its asynchronous transitions on the given executor.
    #[must_use]
    pub fn with_executor(actions: Actions, executor: Arc<dyn Executor>) -> Self {
        Self::build(actions, Some(executor))
    }

    /// Creates a controller running its asynchronous transitions on a [`DedicatedExecutor`].
    ///
    /// # Errors
    ///
    /// This function will return an error if unable to spawn the executor thread.
    pub fn with_dedicated_executor(actions: Actions) -> std::io::Result<Self> {
        let executor = DedicatedExecutor::new("lifecycle-transitions")?;

        Ok(Self::build(actions, Some(Arc::new(executor))))
    }

    fn build(actions: Actions, executor: Option<Arc<dyn Executor>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: ArcSwap::from_pointee(State::Off),
                actions,
                executor,
            }),
        }
    }

    /// Returns the current status of the object.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.state.load().status()
    }

    /// Returns the number of requests in flight: the running ones while on,
    /// or the ones still to be drained while stopping.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.inner.state.load().in_flight()
    }

    /// Starts the object, running `on_start` on the calling thread.
    ///
    /// Nothing happens if the object is already on.
    ///
    /// # Errors
    ///
    /// Will return [`Error::ConcurrentTransition`] if the object is starting or stopping, and
    /// [`Error::StartFailed`] if `on_start` failed. In that case `on_abort` has run and the object is off.
    ///
    /// Will return [`Error::StartPreempted`] if [`stop_now`][Lifecycle::stop_now] forced the object
    /// off while `on_start` was running. `on_abort` has then run once `on_start` returned.
    ///
    /// # Panics
    ///
    /// A panic of `on_start` is resumed on the caller, once the object is rolled back to off.
    #[instrument(skip(self), err)]
    pub fn start(&self) -> Result<(), Error> {
        match self.inner.enter_starting()? {
            Some(starting) => self.inner.run_start(&starting),
            None => Ok(()),
        }
    }

    /// Starts the object, running `on_start` on the executor.
    ///
    /// The object is starting when this method returns.
    ///
    /// # Errors
    ///
    /// Will return [`Error::Unsupported`] if there is no executor, and
    /// [`Error::ConcurrentTransition`] if the object is starting or stopping.
    pub fn start_async(&self) -> Result<(), Error> {
        let executor = self.executor()?;

        if let Some(starting) = self.inner.enter_starting()? {
            let inner = self.inner.clone();
            executor.execute(Box::new(move || {
                if let Err(e) = inner.run_start(&starting) {
                    tracing::warn!(target: LIFECYCLE_LOG_TARGET, %e, "asynchronous start failed");
                }
            }));
        }

        Ok(())
    }

    /// Stops the object gracefully on the calling thread.
    ///
    /// New requests are rejected at once, then the call blocks until the requests in flight
    /// have ended, and runs `on_stop`. Nothing happens if the object is already off.
    ///
    /// # Errors
    ///
    /// Will return [`Error::ConcurrentTransition`] if the object is starting or stopping.
    #[instrument(skip(self), err)]
    pub fn stop(&self) -> Result<(), Error> {
        if let Some(stop) = self.inner.enter_stopping()? {
            self.inner.run_stop(stop);
        }

        Ok(())
    }

    /// Stops the object gracefully, draining the requests and running `on_stop` on the executor.
    ///
    /// The object is stopping when this method returns.
    ///
    /// # Errors
    ///
    /// Will return [`Error::Unsupported`] if there is no executor, and
    /// [`Error::ConcurrentTransition`] if the object is starting or stopping.
    pub fn stop_async(&self) -> Result<(), Error> {
        let executor = self.executor()?;

        if let Some(stop) = self.inner.enter_stopping()? {
            let inner = self.inner.clone();
            executor.execute(Box::new(move || inner.run_stop(stop)));
        }

        Ok(())
    }

    /// Stops the object immediately, without waiting for the requests in flight.
    ///
    /// Preempts a start or a graceful stop in progress. Nothing happens if the object is already off.
    ///
    /// # Errors
    ///
    /// Will return [`Error::ConcurrentTransition`] if `on_stop` is already running.
    #[instrument(skip(self), err)]
    pub fn stop_now(&self) -> Result<(), Error> {
        self.inner.stop_now()
    }

    /// Registers the beginning of a request.
    ///
    /// # Errors
    ///
    /// Will return [`Error::NotAcceptingRequests`] if the object is not on.
    pub fn begin(&self) -> Result<(), Error> {
        self.inner.begin()
    }

    /// Registers the end of a request.
    ///
    /// While stopping, the last request to end lets the stop proceed.
    ///
    /// # Errors
    ///
    /// Will return [`Error::NoRequestsInFlight`] if there is no matching [`begin`][Lifecycle::begin].
    pub fn end(&self) -> Result<(), Error> {
        self.inner.end()
    }

    /// Begins a request that ends when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Will return [`Error::NotAcceptingRequests`] if the object is not on.
    pub fn request(&self) -> Result<Request, Error> {
        self.begin()?;

        Ok(Request { lifecycle: self.clone() })
    }

    /// Waits for the transition in progress to complete.
    ///
    /// Returns `true` at once if the status is permanent, otherwise whether the
    /// transition completed within the timeout.
    #[must_use]
    pub fn await_transition(&self, timeout: Duration) -> bool {
        let current = self.inner.state.load_full();

        current.done().map_or(true, |done| done.wait_for(timeout))
    }

    fn executor(&self) -> Result<&Arc<dyn Executor>, Error> {
        self.inner.executor.as_ref().ok_or(Error::Unsupported)
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.inner.state.load())
            .field("actions", &self.inner.actions)
            .field("asynchronous", &self.inner.executor.is_some())
            .finish()
    }
}

/// A request in flight, ended on drop.
#[must_use = "the request ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Request {
    lifecycle: Lifecycle,
}

impl Drop for Request {
    fn drop(&mut self) {
        if let Err(e) = self.lifecycle.end() {
            tracing::warn!(target: LIFECYCLE_LOG_TARGET, %e, "failed to end request");
        }
    }
}

/// A transient state entered by this thread, with its completion signal.
struct Transition {
    state: Arc<State>,
    done: Arc<Latch>,
}

enum Stop {
    Drain {
        waiting: Arc<State>,
        drain: Arc<Latch>,
        done: Arc<Latch>,
    },
    Immediate(Transition),
}

struct Inner {
    state: ArcSwap<State>,
    actions: Actions,
    executor: Option<Arc<dyn Executor>>,
}

impl Inner {
    /// Replaces `current` with `next`, returning the new snapshot if `current` was still the state.
    fn swap(&self, current: &Arc<State>, next: State) -> Option<Arc<State>> {
        let next = Arc::new(next);
        let previous = self.state.compare_and_swap(current, next.clone());

        Arc::ptr_eq(&*previous, current).then_some(next)
    }

    /// Moves from off to starting. Returns `None` if already on.
    fn enter_starting(&self) -> Result<Option<Transition>, Error> {
        loop {
            let current = self.state.load_full();

            match &*current {
                State::On { .. } => return Ok(None),
                State::Off => {}
                other => return Err(Error::ConcurrentTransition { status: other.status() }),
            }

            let done = Arc::new(Latch::signal());
            if let Some(state) = self.swap(&current, State::Starting { done: done.clone() }) {
                return Ok(Some(Transition { state, done }));
            }

            hint::spin_loop();
        }
    }

    fn run_start(&self, starting: &Transition) -> Result<(), Error> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| invoke(self.actions.on_start.as_ref())));

        match outcome {
            Ok(Ok(())) => {
                if self.swap(&starting.state, State::On { count: 0 }).is_some() {
                    tracing::debug!(target: LIFECYCLE_LOG_TARGET, "started");
                    starting.done.count_down();
                    return Ok(());
                }

                // A forced stop ran `on_stop` before `on_start` was done, release what it built.
                tracing::debug!(target: LIFECYCLE_LOG_TARGET, "start completed after a forced stop, aborting");
                invoke_quietly("on_abort", self.actions.on_abort.as_ref());
                starting.done.count_down();
                Err(Error::StartPreempted)
            }
            Ok(Err(source)) => {
                self.abort(starting);
                Err(Error::StartFailed { source })
            }
            Err(payload) => {
                self.abort(starting);
                panic::resume_unwind(payload)
            }
        }
    }

    fn abort(&self, starting: &Transition) {
        invoke_quietly("on_abort", self.actions.on_abort.as_ref());

        if self.swap(&starting.state, State::Off).is_some() {
            tracing::debug!(target: LIFECYCLE_LOG_TARGET, "start aborted");
        }
        starting.done.count_down();
    }

    /// Moves from on to stopping, either waiting for the requests in flight or,
    /// when there are none, straight to the stop action. Returns `None` if already off.
    fn enter_stopping(&self) -> Result<Option<Stop>, Error> {
        loop {
            let current = self.state.load_full();

            let count = match &*current {
                State::Off => return Ok(None),
                State::On { count } => *count,
                other => return Err(Error::ConcurrentTransition { status: other.status() }),
            };

            let done = Arc::new(Latch::signal());

            if count == 0 {
                if let Some(state) = self.swap(&current, State::Stopping { done: done.clone() }) {
                    return Ok(Some(Stop::Immediate(Transition { state, done })));
                }
            } else {
                let drain = Arc::new(Latch::new(count));
                let waiting = State::Waiting {
                    drain: drain.clone(),
                    done: done.clone(),
                };

                if let Some(waiting) = self.swap(&current, waiting) {
                    tracing::debug!(target: LIFECYCLE_LOG_TARGET, count, "draining requests");
                    return Ok(Some(Stop::Drain { waiting, drain, done }));
                }
            }

            hint::spin_loop();
        }
    }

    fn run_stop(&self, stop: Stop) {
        let stopping = match stop {
            Stop::Immediate(stopping) => stopping,
            Stop::Drain { waiting, drain, done } => {
                drain.wait();

                let Some(state) = self.swap(&waiting, State::Stopping { done: done.clone() }) else {
                    // A forced stop took over, it completes the same signal.
                    done.wait();
                    return;
                };

                Transition { state, done }
            }
        };

        self.halt(&stopping);
    }

    fn stop_now(&self) -> Result<(), Error> {
        loop {
            let current = self.state.load_full();

            let (done, drain) = match &*current {
                State::Off => return Ok(()),
                State::Stopping { .. } => return Err(Error::ConcurrentTransition { status: Status::Stopping }),
                State::On { .. } | State::Starting { .. } => (Arc::new(Latch::signal()), None),
                State::Waiting { drain, done } => (done.clone(), Some(drain.clone())),
            };

            if let Some(state) = self.swap(&current, State::Stopping { done: done.clone() }) {
                if let Some(drain) = drain {
                    drain.open();
                }

                self.halt(&Transition { state, done });
                return Ok(());
            }

            hint::spin_loop();
        }
    }

    fn halt(&self, stopping: &Transition) {
        invoke_quietly("on_stop", self.actions.on_stop.as_ref());

        // Only the owner of the stopping state leaves it.
        self.state.store(Arc::new(State::Off));

        tracing::debug!(target: LIFECYCLE_LOG_TARGET, "stopped");
        stopping.done.count_down();
    }

    fn begin(&self) -> Result<(), Error> {
        loop {
            let current = self.state.load_full();

            let State::On { count } = &*current else {
                return Err(Error::NotAcceptingRequests {
                    status: current.status(),
                });
            };

            if self.swap(&current, State::On { count: count + 1 }).is_some() {
                return Ok(());
            }

            hint::spin_loop();
        }
    }

    fn end(&self) -> Result<(), Error> {
        loop {
            let current = self.state.load_full();

            match &*current {
                State::On { count } if *count > 0 => {
                    if self.swap(&current, State::On { count: count - 1 }).is_some() {
                        return Ok(());
                    }
                }
                State::Waiting { drain, .. } => {
                    return if drain.count_down() {
                        Ok(())
                    } else {
                        Err(Error::NoRequestsInFlight {
                            status: current.status(),
                        })
                    };
                }
                other => {
                    return Err(Error::NoRequestsInFlight { status: other.status() });
                }
            }

            hint::spin_loop();
        }
    }
}

fn invoke(action: Option<&Action>) -> Result<(), ActionError> {
    action.map_or(Ok(()), |action| action())
}

/// Runs the action, logging and discarding its failure.
fn invoke_quietly(name: &'static str, action: Option<&Action>) {
    match panic::catch_unwind(AssertUnwindSafe(|| invoke(action))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(target: LIFECYCLE_LOG_TARGET, action = name, %e, "lifecycle action failed"),
        Err(_) => tracing::warn!(target: LIFECYCLE_LOG_TARGET, action = name, "lifecycle action panicked"),
    }
}
