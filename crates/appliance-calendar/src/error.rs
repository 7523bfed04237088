//! Error types for appliance-calendar operations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{EventId, Target, UserId};

#[derive(Error, Debug)]
pub enum CalendarError {
    /// The data source call failed. Surfaced as an error view state; retry is a re-fetch.
    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    /// The requested time collides with an approved booking of the same appliance.
    #[error("Time is not free: overlaps approved booking {conflicting}")]
    TimeConflict { conflicting: EventId },

    /// Malformed input rejected before any mutation was attempted.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Booking not found: {0}")]
    NotFound(EventId),

    #[error("User {user} may not modify {target}")]
    NotPermitted { user: UserId, target: Target },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid time range: {start} is not before {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
