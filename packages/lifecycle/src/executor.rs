//! Executors for asynchronous transitions.
//!
//! The controller treats an [`Executor`] as an opaque task sink: the asynchronous
//! transitions perform their checks on the calling thread and submit the transition
//! body (the user supplied actions) to the executor.
//!
//! Provided implementations:
//!
//! - [`DedicatedExecutor`]: a single named background thread.
//! - [`tokio::runtime::Handle`]: runs the transition on the blocking pool of the runtime.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::Sender;

use crate::LIFECYCLE_LOG_TARGET;

/// A transition body submitted to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A sink for the transition bodies of the asynchronous transitions.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Runs the task, eventually.
    fn execute(&self, task: Task);
}

impl Executor for tokio::runtime::Handle {
    fn execute(&self, task: Task) {
        drop(self.spawn_blocking(task));
    }
}

/// An executor running every task, in submission order, on a single background thread.
///
/// The thread ends once the executor is dropped and the queued tasks are done.
#[derive(Debug)]
pub struct DedicatedExecutor {
    tx: Sender<Task>,
}

impl DedicatedExecutor {
    /// Spawns the background thread.
    ///
    /// # Errors
    ///
    /// This function will return an error if the operating system fails to spawn the thread.
    pub fn new(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();

        thread::Builder::new().name(name.to_owned()).spawn(move || {
            for task in rx {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    tracing::error!(target: LIFECYCLE_LOG_TARGET, "transition task panicked");
                }
            }
        })?;

        Ok(Self { tx })
    }
}

impl Executor for DedicatedExecutor {
    fn execute(&self, task: Task) {
        // The worker only exits after the sender is dropped.
        if let Err(rejected) = self.tx.send(task) {
            tracing::error!(target: LIFECYCLE_LOG_TARGET, "dedicated executor is gone, running the transition inline");
            (rejected.into_inner())();
        }
    }
}
