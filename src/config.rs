//! Configuration for the active object worker.
//!
//! The configuration is layered with [`figment`]:
//!
//! 1. The defaults of [`Configuration`].
//! 2. An optional TOML file.
//! 3. Environment variables prefixed with [`ENV_VAR_CONFIG_OVERRIDE_PREFIX`], where `__` separates
//!    the nested keys (e.g. `TORRUST_ACTIVE_OBJECT_CONFIG_OVERRIDE_WORKER__JOBS=10`).
//!
//! ```toml
//! [logging]
//! threshold = "info"
//!
//! [lifecycle]
//! executor = "dedicated"
//! drain_timeout_secs = 5
//!
//! [worker]
//! jobs = 32
//! job_duration_ms = 250
//! submit_interval_ms = 50
//! ```
use std::path::Path;
use std::time::Duration;

use derive_more::Display;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Prefix for the environment variables overriding the configuration.
pub const ENV_VAR_CONFIG_OVERRIDE_PREFIX: &str = "TORRUST_ACTIVE_OBJECT_CONFIG_OVERRIDE_";

/// Path of the TOML configuration file, when not given on the command line.
pub const ENV_VAR_CONFIG_TOML_PATH: &str = "TORRUST_ACTIVE_OBJECT_CONFIG_TOML_PATH";

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct Configuration {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub worker: Worker,
}

impl Configuration {
    /// Loads the configuration from the defaults, the optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// Will return an error if the file cannot be read, or any layer has an invalid value.
    pub fn load(toml_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Configuration::default()));

        if let Some(toml_path) = toml_path {
            figment = figment.merge(Toml::file(toml_path));
        }

        figment.merge(Env::prefixed(ENV_VAR_CONFIG_OVERRIDE_PREFIX).split("__")).extract()
    }

    /// Loads the configuration from the defaults and a TOML document, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Will return an error if the document has an invalid value.
    pub fn load_from_toml(toml: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::string(toml))
            .extract()
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Logging {
    #[serde(default)]
    pub threshold: Threshold,
}

/// The maximum verbosity of the logs.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Display, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    #[display("off")]
    Off,
    #[display("error")]
    Error,
    #[display("warn")]
    Warn,
    #[default]
    #[display("info")]
    Info,
    #[display("debug")]
    Debug,
    #[display("trace")]
    Trace,
}

/// Where the asynchronous lifecycle transitions run.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Display, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// No asynchronous transitions, the worker is stopped on a blocking task.
    #[display("none")]
    None,
    /// A dedicated background thread.
    #[default]
    #[display("dedicated")]
    Dedicated,
    /// The blocking pool of the tokio runtime.
    #[display("tokio")]
    Tokio,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct Lifecycle {
    pub executor: ExecutorKind,
    /// How long a graceful stop waits for the jobs in flight before forcing the stop.
    pub drain_timeout_secs: u64,
}

impl Lifecycle {
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::default(),
            drain_timeout_secs: 5,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct Worker {
    /// The number of jobs to submit before shutting down.
    pub jobs: u64,
    pub job_duration_ms: u64,
    pub submit_interval_ms: u64,
}

impl Worker {
    #[must_use]
    pub fn job_duration(&self) -> Duration {
        Duration::from_millis(self.job_duration_ms)
    }

    #[must_use]
    pub fn submit_interval(&self) -> Duration {
        Duration::from_millis(self.submit_interval_ms)
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            jobs: 32,
            job_duration_ms: 250,
            submit_interval_ms: 50,
        }
    }
}
