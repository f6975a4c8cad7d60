//! Torrust Active Object
//!
//! A job worker whose life cycle is guarded by the lock-free controller of the
//! [`torrust_lifecycle`] package. It shows how a long-lived service object:
//!
//! - starts and stops through a [`Lifecycle`][torrust_lifecycle::Lifecycle],
//! - brackets every unit of work with a request, so that new jobs are rejected once a stop is requested,
//! - drains the jobs in flight before it is off, falling back to an immediate stop after a timeout.
//!
//! The application is organized into several modules:
//!
//! - The [`config`] module: Defines the layered [`Configuration`][config::Configuration].
//! - The [`bootstrap`] module: Loads the configuration and sets up tracing.
//! - The [`worker`] module: Defines the [`Worker`][worker::Worker] active object.
//! - The [`app`] module: Runs the worker until the job budget is spent or `ctrl-c`.
pub mod app;
pub mod bootstrap;
pub mod config;
pub mod worker;
