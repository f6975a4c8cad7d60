//! Job Worker - An active object running jobs on the tokio runtime.
//!
//! Every job is a request of the worker [`Lifecycle`]: a job can only be submitted while the
//! worker is on, and a graceful [`shutdown`][Worker::shutdown] waits for the submitted jobs
//! to finish before the worker is off.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use torrust_lifecycle::{Actions, Executor, Lifecycle, Status};

use crate::app::Error;
use crate::config;

pub const WORKER_LOG_TARGET: &str = "WORKER";

/// A worker accepting jobs while on.
#[derive(Debug, Clone)]
pub struct Worker {
    lifecycle: Lifecycle,
    processed: Arc<AtomicU64>,
    job_duration: Duration,
}

impl Worker {
    /// Creates a worker, off. Without an executor the worker is stopped on a blocking task.
    #[must_use]
    pub fn new(config: &config::Worker, executor: Option<Arc<dyn Executor>>) -> Self {
        let processed = Arc::new(AtomicU64::new(0));

        let actions = Actions::default()
            .on_start(|| {
                tracing::info!(target: WORKER_LOG_TARGET, "accepting jobs");
                Ok(())
            })
            .on_stop({
                let processed = processed.clone();
                move || {
                    tracing::info!(target: WORKER_LOG_TARGET, processed = processed.load(Ordering::Relaxed), "stopped");
                    Ok(())
                }
            });

        let lifecycle = match executor {
            Some(executor) => Lifecycle::with_executor(actions, executor),
            None => Lifecycle::new(actions),
        };

        Self {
            lifecycle,
            processed,
            job_duration: config.job_duration(),
        }
    }

    /// Starts the worker.
    ///
    /// # Errors
    ///
    /// Will return an error if the worker is in the middle of a transition.
    pub fn start(&self) -> Result<(), Error> {
        self.lifecycle.start()?;

        Ok(())
    }

    /// Submits a job, running it on the tokio runtime.
    ///
    /// # Errors
    ///
    /// Will return an error if the worker is not on.
    pub fn submit(&self, job: u64) -> Result<JoinHandle<()>, Error> {
        let request = self.lifecycle.request()?;
        let processed = self.processed.clone();
        let job_duration = self.job_duration;

        Ok(tokio::spawn(async move {
            tokio::time::sleep(job_duration).await;
            processed.fetch_add(1, Ordering::Relaxed);

            tracing::debug!(target: WORKER_LOG_TARGET, job, "job done");
            drop(request);
        }))
    }

    /// Stops the worker, waiting up to `drain_timeout` for the jobs in flight before forcing it off.
    ///
    /// Returns the status of the worker once done.
    ///
    /// # Errors
    ///
    /// Will return an error if the worker is in the middle of another transition, or the stop task fails.
    pub async fn shutdown(&self, drain_timeout: Duration) -> Result<Status, Error> {
        let lifecycle = self.lifecycle.clone();

        tracing::info!(target: WORKER_LOG_TARGET, in_flight = self.in_flight(), "shutting down");

        let drained = match self.lifecycle.stop_async() {
            Ok(()) => tokio::task::spawn_blocking(move || lifecycle.await_transition(drain_timeout)).await?,
            Err(torrust_lifecycle::Error::Unsupported) => {
                let stop = tokio::task::spawn_blocking(move || lifecycle.stop());

                match tokio::time::timeout(drain_timeout, stop).await {
                    Ok(stopped) => {
                        stopped??;
                        true
                    }
                    Err(_elapsed) => false,
                }
            }
            Err(e) => return Err(e.into()),
        };

        if !drained {
            tracing::warn!(target: WORKER_LOG_TARGET, in_flight = self.in_flight(), "jobs did not finish in time, stopping now");
            force_stop(&self.lifecycle, drain_timeout).await?;
        }

        Ok(self.status())
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.lifecycle.status()
    }

    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.lifecycle.in_flight()
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

/// Stops the lifecycle immediately. If `on_stop` is already running, waits up to `timeout` for it instead.
async fn force_stop(lifecycle: &Lifecycle, timeout: Duration) -> Result<(), Error> {
    match lifecycle.stop_now() {
        Ok(()) => Ok(()),
        Err(torrust_lifecycle::Error::ConcurrentTransition { .. }) => {
            let lifecycle = lifecycle.clone();
            let stopped = tokio::task::spawn_blocking(move || lifecycle.await_transition(timeout)).await?;

            if !stopped {
                tracing::warn!(target: WORKER_LOG_TARGET, "the stop action did not finish in time");
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use torrust_lifecycle::{Actions, DedicatedExecutor, Executor, Lifecycle, Status};

    use crate::config;
    use crate::worker::{force_stop, Worker};

    fn quick() -> config::Worker {
        config::Worker {
            jobs: 4,
            job_duration_ms: 10,
            submit_interval_ms: 1,
        }
    }

    #[tokio::test]
    async fn it_should_not_accept_jobs_before_it_is_started() {
        let worker = Worker::new(&quick(), None);

        assert!(worker.submit(0).is_err());
        assert_eq!(worker.status(), Status::Off);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn it_should_finish_the_submitted_jobs_before_stopping() {
        let executor: Arc<dyn Executor> = Arc::new(DedicatedExecutor::new("test-transitions").unwrap());
        let worker = Worker::new(&quick(), Some(executor));
        worker.start().unwrap();

        for job in 0..4 {
            drop(worker.submit(job).unwrap());
        }

        let status = worker.shutdown(Duration::from_secs(10)).await.unwrap();

        assert_eq!(status, Status::Off);
        assert_eq!(worker.processed(), 4);
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn it_should_stop_on_a_blocking_task_without_an_executor() {
        let worker = Worker::new(&quick(), None);
        worker.start().unwrap();

        let job = worker.submit(0).unwrap();
        let status = worker.shutdown(Duration::from_secs(10)).await.unwrap();

        job.await.unwrap();
        assert_eq!(status, Status::Off);
        assert_eq!(worker.processed(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn it_should_force_the_stop_when_the_jobs_take_too_long() {
        let slow = config::Worker {
            job_duration_ms: 60_000,
            ..quick()
        };
        let worker = Worker::new(&slow, Some(Arc::new(tokio::runtime::Handle::current())));
        worker.start().unwrap();

        let job = worker.submit(0).unwrap();
        let status = worker.shutdown(Duration::from_millis(50)).await.unwrap();

        assert_eq!(status, Status::Off);
        assert_eq!(worker.processed(), 0);
        assert!(worker.submit(1).is_err());

        job.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn it_should_wait_for_a_stop_action_already_running_instead_of_failing() {
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = parking_lot::Mutex::new(release_rx);

        let actions = Actions::default().on_stop(move || {
            release_rx.lock().recv().unwrap();
            Ok(())
        });
        let lifecycle = Lifecycle::with_dedicated_executor(actions).unwrap();
        lifecycle.start().unwrap();
        lifecycle.stop_async().unwrap();
        assert_eq!(lifecycle.status(), Status::Stopping);

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            release_tx.send(()).unwrap();
        });

        force_stop(&lifecycle, Duration::from_secs(10)).await.unwrap();

        releaser.join().unwrap();
        assert_eq!(lifecycle.status(), Status::Off);
    }
}
