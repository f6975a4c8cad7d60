//! Active Object Lifecycle Package
//!
//! This package provides a lock-free lifecycle controller for long-lived service objects,
//! giving them a uniform start/stop protocol and a graceful shutdown that waits for
//! in-flight requests to drain before the stop action runs.
//!
//! The package is organized into several modules:
//!
//! - The [`status`] module: Defines the externally visible [`Status`] of an active object.
//! - The [`lifecycle`] module: Defines the [`Lifecycle`] controller, the [`Actions`] it runs on each transition and the [`Request`] guard.
//! - The [`executor`] module: Defines the [`Executor`] trait used to run transitions asynchronously, and the [`DedicatedExecutor`].
//! - The [`error`] module: Defines the [`Error`] returned by the controller operations.
//!
//! The transitions are as follows:
//!
//! - [`Off`][Status::Off] to [`Starting`][Status::Starting]: [`start`][Lifecycle::start] or [`start_async`][Lifecycle::start_async]. The `on_start` action runs, then the object is [`On`][Status::On]. If it fails, or a [`stop_now`][Lifecycle::stop_now] overtook it, `on_abort` runs and the object is [`Off`][Status::Off] again.
//! - [`On`][Status::On] to [`Stopping`][Status::Stopping]: [`stop`][Lifecycle::stop] or [`stop_async`][Lifecycle::stop_async]. New requests are rejected, the in-flight requests are drained, then `on_stop` runs and the object is [`Off`][Status::Off].
//! - Any state to [`Stopping`][Status::Stopping]: [`stop_now`][Lifecycle::stop_now]. Runs `on_stop` immediately without draining.
//!
//! Work performed while the object is on must be bracketed with [`begin`][Lifecycle::begin] and [`end`][Lifecycle::end]
//! (or held through a [`Request`] guard).

pub mod error;
pub mod executor;
pub mod lifecycle;
mod latch;
mod state;
pub mod status;

pub use error::{ActionError, Error};
pub use executor::{DedicatedExecutor, Executor, Task};
pub use lifecycle::{Action, Actions, Lifecycle, Request};
pub use status::Status;

/// The log target used by the lifecycle controller.
pub const LIFECYCLE_LOG_TARGET: &str = "LIFECYCLE";
