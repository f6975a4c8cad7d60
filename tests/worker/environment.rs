use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use torrust_active_object::app;
use torrust_active_object::config::Configuration;
use torrust_active_object::worker::Worker;
use torrust_lifecycle::Status;
use tracing::instrument;

#[derive(Debug)]
pub enum Error {
    #[allow(dead_code)]
    Error(String),
}

pub struct Running {
    pub jobs: JoinSet<()>,
    pub drain_timeout: Duration,
}

pub struct Stopped {
    pub status: Status,
}

pub struct Environment<S> {
    pub worker: Arc<Worker>,
    pub state: S,
}

impl Environment<Stopped> {
    pub fn new(config: &Configuration) -> Self {
        let executor = app::executor(config.lifecycle.executor).expect("it should build the executor");

        Self {
            worker: Arc::new(Worker::new(&config.worker, executor)),
            state: Stopped { status: Status::Off },
        }
    }

    /// Start the test environment for the worker.
    #[instrument(skip(self, config))]
    pub fn start(self, config: &Configuration) -> Environment<Running> {
        self.worker.start().expect("it should start the worker");

        tracing::info!(status = %self.worker.status(), "started");

        Environment {
            worker: self.worker,
            state: Running {
                jobs: JoinSet::new(),
                drain_timeout: config.lifecycle.drain_timeout(),
            },
        }
    }
}

impl Environment<Running> {
    pub fn new(config: &Configuration) -> Self {
        Environment::<Stopped>::new(config).start(config)
    }

    pub fn submit(&mut self, job: u64) -> Result<(), Error> {
        let handle = self.worker.submit(job).map_err(|e| Error::Error(e.to_string()))?;

        self.state.jobs.spawn(async move {
            handle.await.expect("it should finish the job");
        });

        Ok(())
    }

    pub async fn stop(mut self) -> Result<Environment<Stopped>, Error> {
        let status = self
            .worker
            .shutdown(self.state.drain_timeout)
            .await
            .map_err(|e| Error::Error(e.to_string()))?;

        while let Some(job) = self.state.jobs.join_next().await {
            if let Err(e) = job {
                tracing::error!(%e, "failed to cleanly join job");
                panic!("failed to cleanly join job")
            }
        }

        Ok(Environment {
            worker: self.worker,
            state: Stopped { status },
        })
    }
}
