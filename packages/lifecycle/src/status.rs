//! Active Object Status - The externally visible lifecycle status.
//!
//! A status is *permanent* if an explicit call to a lifecycle-changing method is required
//! for it to change. A status is *transient* if it will eventually change to a permanent
//! one without any further action.

use derive_more::Display;
use serde::Serialize;

/// The status of an active object.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The object is active and accepting requests.
    #[display("on")]
    On,
    /// The object is in process of being started.
    #[display("starting")]
    Starting,
    /// The object is in process of being stopped.
    #[display("stopping")]
    Stopping,
    /// The object is inactive and does not accept requests.
    #[display("off")]
    Off,
}

impl Status {
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        matches!(self, Status::On | Status::Off)
    }

    #[must_use]
    pub const fn is_transient(self) -> bool {
        !self.is_permanent()
    }
}
