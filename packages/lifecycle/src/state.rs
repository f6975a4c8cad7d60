//! The internal states of the lifecycle controller.
//!
//! A state is an immutable snapshot. Every change allocates a new state that is
//! compare-and-swapped into the controller cell, so the identity of the snapshot
//! read by a thread tells whether the state changed since it was read.

use std::sync::Arc;

use crate::latch::Latch;
use crate::status::Status;

#[derive(Debug)]
pub(crate) enum State {
    Off,
    /// The `on_start` action is running.
    Starting { done: Arc<Latch> },
    /// Accepting requests, with the number of requests in flight.
    On { count: u64 },
    /// A graceful stop is waiting for the in-flight requests to end.
    Waiting { drain: Arc<Latch>, done: Arc<Latch> },
    /// The `on_stop` action is running.
    Stopping { done: Arc<Latch> },
}

impl State {
    pub(crate) fn status(&self) -> Status {
        match self {
            State::Off => Status::Off,
            State::Starting { .. } => Status::Starting,
            State::On { .. } => Status::On,
            State::Waiting { .. } | State::Stopping { .. } => Status::Stopping,
        }
    }

    /// The completion signal of a transient state.
    pub(crate) fn done(&self) -> Option<&Arc<Latch>> {
        match self {
            State::Off | State::On { .. } => None,
            State::Starting { done } | State::Waiting { done, .. } | State::Stopping { done } => Some(done),
        }
    }

    pub(crate) fn in_flight(&self) -> u64 {
        match self {
            State::On { count } => *count,
            State::Waiting { drain, .. } => drain.count(),
            State::Off | State::Starting { .. } | State::Stopping { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::State;
    use crate::latch::Latch;
    use crate::Status;

    #[test]
    fn it_should_report_a_waiting_state_as_stopping() {
        let waiting = State::Waiting {
            drain: Arc::new(Latch::new(2)),
            done: Arc::new(Latch::signal()),
        };

        assert_eq!(waiting.status(), Status::Stopping);
        assert_eq!(waiting.in_flight(), 2);
        assert!(waiting.done().is_some());
    }

    #[test]
    fn it_should_only_have_a_completion_signal_in_the_transient_states() {
        assert!(State::Off.done().is_none());
        assert!(State::On { count: 3 }.done().is_none());
        assert!(State::Starting {
            done: Arc::new(Latch::signal())
        }
        .done()
        .is_some());
    }
}
