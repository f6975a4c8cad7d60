use torrust_active_object::config::{Configuration, ExecutorKind};
use torrust_lifecycle::Status;

use crate::worker::environment::{Environment, Running};

fn configuration(executor: ExecutorKind) -> Configuration {
    Configuration::load_from_toml(&format!(
        r#"
        [lifecycle]
        executor = "{executor}"
        drain_timeout_secs = 10

        [worker]
        jobs = 5
        job_duration_ms = 20
        submit_interval_ms = 1
        "#
    ))
    .expect("it should load the configuration")
}

async fn it_should_drain_every_submitted_job(executor: ExecutorKind) {
    let config = configuration(executor);
    let mut env = Environment::<Running>::new(&config);

    for job in 0..config.worker.jobs {
        env.submit(job).expect("it should accept the job while on");
    }

    let env = env.stop().await.expect("it should stop the worker");

    assert_eq!(env.state.status, Status::Off);
    assert_eq!(env.worker.processed(), config.worker.jobs);
    assert_eq!(env.worker.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn it_should_drain_every_submitted_job_using_a_dedicated_executor() {
    it_should_drain_every_submitted_job(ExecutorKind::Dedicated).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn it_should_drain_every_submitted_job_using_the_tokio_executor() {
    it_should_drain_every_submitted_job(ExecutorKind::Tokio).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn it_should_drain_every_submitted_job_without_an_executor() {
    it_should_drain_every_submitted_job(ExecutorKind::None).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn it_should_reject_jobs_once_stopped_and_accept_them_after_a_restart() {
    let config = configuration(ExecutorKind::Dedicated);

    let env = Environment::<Running>::new(&config).stop().await.expect("it should stop the worker");
    assert!(env.worker.submit(0).is_err());

    let mut env = env.start(&config);

    env.submit(1).expect("it should accept jobs after a restart");

    let env = env.stop().await.expect("it should stop the worker again");
    assert_eq!(env.worker.processed(), 1);
}
