//! Setup for the main application.
//!
//! The [`setup`] function loads the configuration and installs the tracing subscriber.
pub mod tracing;

use std::path::Path;

use crate::config::Configuration;

/// Loads the configuration and initializes the tracing.
///
/// # Errors
///
/// Will return an error if the configuration cannot be loaded.
pub fn setup(toml_path: Option<&Path>) -> Result<Configuration, figment::Error> {
    let configuration = Configuration::load(toml_path)?;

    tracing::setup(&configuration.logging);

    ::tracing::debug!(?configuration, "configuration loaded");

    Ok(configuration)
}
