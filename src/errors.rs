//! Typed error hierarchy for the issue bridge.
//!
//! Two top-level enums cover the two failure domains:
//! - `TrackerError`: outbound calls to the issue tracker
//! - `BridgeError`: storage, lookup, and request failures

use thiserror::Error;

/// Errors from the issue-tracker client.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracker request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Tracker returned status {status}")]
    Status { status: u16 },

    #[error("Failed to decode tracker response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Tracker response carried no ticket id")]
    MissingTicketId,
}

/// Errors from the bridge service layer.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Issue {tracker_id} not found")]
    IssueNotFound { tracker_id: String },

    #[error("Issue with id {id} not found")]
    IssueRowNotFound { id: i64 },

    #[error("Issue with tracker id {tracker_id} already exists")]
    DuplicateTrackerId { tracker_id: String },

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}
