//! The main application: a [`Worker`] fed with jobs until the job budget is spent or the
//! process receives `ctrl-c`, then shut down gracefully.
use std::sync::Arc;

use thiserror::Error;
use torrust_lifecycle::{DedicatedExecutor, Executor};
use tracing::{info, instrument};

use crate::config::{Configuration, ExecutorKind};
use crate::worker::Worker;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load the configuration: {0}")]
    Configuration(#[from] figment::Error),

    #[error(transparent)]
    Lifecycle(#[from] torrust_lifecycle::Error),

    #[error("failed to spawn the transition executor: {0}")]
    Executor(#[from] std::io::Error),

    #[error("failed to join the stopping task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Builds the executor for the asynchronous transitions of the worker.
///
/// # Errors
///
/// Will return an error if unable to spawn the dedicated executor thread.
pub fn executor(kind: ExecutorKind) -> Result<Option<Arc<dyn Executor>>, Error> {
    let executor: Arc<dyn Executor> = match kind {
        ExecutorKind::None => return Ok(None),
        ExecutorKind::Dedicated => Arc::new(DedicatedExecutor::new("worker-transitions")?),
        ExecutorKind::Tokio => Arc::new(tokio::runtime::Handle::current()),
    };

    Ok(Some(executor))
}

/// Runs the worker.
///
/// # Errors
///
/// Will return an error if the worker fails to start or to stop.
#[instrument(skip(config))]
pub async fn run(config: &Configuration) -> Result<(), Error> {
    let worker = Worker::new(&config.worker, executor(config.lifecycle.executor)?);

    worker.start()?;

    let mut ticker = tokio::time::interval(config.worker.submit_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut submitted = 0;
    while submitted < config.worker.jobs {
        tokio::select! {
            _ = &mut shutdown => {
                info!("received ctrl-c, shutting down..");
                break;
            }
            _ = ticker.tick() => {
                drop(worker.submit(submitted)?);
                submitted += 1;
            }
        }
    }

    let status = worker.shutdown(config.lifecycle.drain_timeout()).await?;

    info!(%status, submitted, processed = worker.processed(), "worker shut down");

    Ok(())
}
