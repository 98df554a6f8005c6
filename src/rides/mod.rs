//!
//! Documentation of the rides module.
//! The ride lifecycle, booking, payment, rating and search rules.
//!
//! Nothing in here touches the database or the network: every operation takes
//! the ride (or rides), the caller and a single `now` read for the request,
//! and either mutates the ride or reports the first guard that failed.
//!

use super::ODM;
use super::config;

pub mod error;
pub mod lifecycle;
pub mod booking;
pub mod payments;
pub mod rating;
pub mod search;

#[cfg(test)]
pub mod testing;

use chrono::Duration;
use config::config::ConfyConfig;
use ODM::models::Role;

/// The authenticated identity behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new<S: Into<String>>(id: S, role: Role) -> Self {
        Caller { id: id.into(), role }
    }
}

/// Tunable time rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rules {
    /// How long after booking a passenger may still cancel
    pub cancellation_window: Duration,
    /// Percentage of the planned duration that must elapse before completion
    pub completion_threshold_percent: i64,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            cancellation_window: Duration::minutes(3),
            completion_threshold_percent: 70,
        }
    }
}

impl From<&ConfyConfig> for Rules {
    fn from(config: &ConfyConfig) -> Self {
        Rules {
            cancellation_window: Duration::minutes(config.cancellation_window_minutes.max(0)),
            completion_threshold_percent: config.completion_threshold_percent.clamp(0, 100),
        }
    }
}

/// Whole minutes in `duration`, rounded up
pub fn ceil_minutes(duration: Duration) -> i64 {
    let millis = duration.num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + 59_999) / 60_000
}
