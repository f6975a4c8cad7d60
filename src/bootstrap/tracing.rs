//! Setup for the application tracing.
//!
//! It redirects the tracing info to the standard output with the threshold defined in the configuration.
//!
//! - `Off` (i.e. don't load any subscriber...)
//! - `Error`
//! - `Warn`
//! - `Info`
//! - `Debug`
//! - `Trace`
use std::sync::Once;

use tracing::info;

use crate::config::{Logging, Threshold};

static INIT: Once = Once::new();

/// It redirects the tracing info to the standard output with the threshold defined in the configuration
pub fn setup(cfg: &Logging) {
    let Some(level) = config_level(cfg.threshold) else {
        return;
    };

    INIT.call_once(|| {
        stdout_config(level);
    });
}

fn config_level(threshold: Threshold) -> Option<tracing::Level> {
    match threshold {
        Threshold::Off => None,
        Threshold::Error => Some(tracing::Level::ERROR),
        Threshold::Warn => Some(tracing::Level::WARN),
        Threshold::Info => Some(tracing::Level::INFO),
        Threshold::Debug => Some(tracing::Level::DEBUG),
        Threshold::Trace => Some(tracing::Level::TRACE),
    }
}

fn stdout_config(level: tracing::Level) {
    let () = tracing_subscriber::fmt().with_max_level(level).init();

    info!("tracing initialized.");
}

#[cfg(test)]
mod tests {
    use super::config_level;
    use crate::config::Threshold;

    #[test]
    fn it_should_not_have_a_level_when_the_threshold_is_off() {
        assert_eq!(config_level(Threshold::Off), None);
        assert_eq!(config_level(Threshold::Warn), Some(tracing::Level::WARN));
    }
}
