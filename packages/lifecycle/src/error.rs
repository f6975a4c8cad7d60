//! Errors returned by the lifecycle controller.
//!
//! - [`Error::NotAcceptingRequests`] and [`Error::NoRequestsInFlight`] are *illegal state* errors,
//!   they signal a defect in the caller (a request outside of the `on` status, or an unmatched `end`).
//! - [`Error::ConcurrentTransition`] is returned when another thread is driving a transition.
//!   The caller may wait for it to finish and retry.
//! - [`Error::Unsupported`] is returned by the asynchronous transitions when no executor was configured.
//! - [`Error::StartFailed`] carries the error returned by the `on_start` action, after the rollback completed.
//! - [`Error::StartPreempted`] is returned by a start that a forced stop overtook.

use thiserror::Error;

use crate::status::Status;

/// The error type returned by the user supplied lifecycle actions.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    #[error("the object is {status} and does not accept new requests")]
    NotAcceptingRequests { status: Status },

    #[error("the object ({status}) does not have any running requests")]
    NoRequestsInFlight { status: Status },

    #[error("a concurrent transition is in progress, the object is {status}")]
    ConcurrentTransition { status: Status },

    #[error("this object does not support asynchronous transitions")]
    Unsupported,

    #[error("failed to start the object: {source}")]
    StartFailed {
        #[source]
        source: ActionError,
    },

    #[error("the object was forced off before it finished starting")]
    StartPreempted,
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::NotAcceptingRequests { .. } => "lifecycle_not_accepting_requests",
            Error::NoRequestsInFlight { .. } => "lifecycle_no_requests_in_flight",
            Error::ConcurrentTransition { .. } => "lifecycle_concurrent_transition",
            Error::Unsupported => "lifecycle_unsupported",
            Error::StartFailed { .. } => "lifecycle_start_failed",
            Error::StartPreempted => "lifecycle_start_preempted",
        }
    }

    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::NotAcceptingRequests { .. } | Error::NoRequestsInFlight { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, Status};

    #[test]
    fn it_should_classify_the_request_errors_as_illegal_state() {
        assert!(Error::NotAcceptingRequests { status: Status::Off }.is_illegal_state());
        assert!(Error::NoRequestsInFlight { status: Status::On }.is_illegal_state());

        assert!(!Error::ConcurrentTransition {
            status: Status::Starting
        }
        .is_illegal_state());
        assert!(!Error::Unsupported.is_illegal_state());
        assert!(!Error::StartPreempted.is_illegal_state());
    }

    #[test]
    fn it_should_keep_the_start_failure_as_source() {
        let error = Error::StartFailed {
            source: "address in use".into(),
        };

        assert_eq!(error.to_string(), "failed to start the object: address in use");
        assert_eq!(
            std::error::Error::source(&error).map(ToString::to_string),
            Some("address in use".to_string())
        );
        assert_eq!(error.as_label(), "lifecycle_start_failed");
    }
}
