//! Error types used throughout the application
//!
//! Policy-level availability conflicts are deliberately NOT represented here.
//! The availability evaluator reports them as structured result values so all
//! checks can run and be surfaced together; these variants cover programmer
//! errors, missing records, and infrastructure failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Bookwise
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BookwiseError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("{0}")]
    NoAvailableMember(String),

    #[error("Department '{0}' does not have an assignment algorithm configured")]
    NoAssignmentAlgorithm(String),

    /// Wall-clock time that occurs twice during a DST fall-back transition.
    #[error("Local time {local} is ambiguous in {zone}")]
    AmbiguousLocalTime { zone: String, local: String },

    /// Wall-clock time skipped by a DST spring-forward transition.
    #[error("Local time {local} does not exist in {zone}")]
    NonexistentLocalTime { zone: String, local: String },

    /// Commit-time double-booking race. Retryable after re-evaluation.
    #[error("Booking conflict: {0}")]
    BookingConflict(String),

    /// Policy rejection of a requested slot (working hours, buffers, quotas).
    /// Terminal for the current request; not retryable as-is.
    #[error("Requested slot is not available: {0}")]
    SlotUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookwiseError {
    /// Whether the caller should re-run evaluation and retry the request.
    ///
    /// Only commit-time races qualify; policy rejections need a different
    /// slot or member, not a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BookingConflict(_))
    }
}

/// Result type alias for Bookwise operations
pub type Result<T> = std::result::Result<T, BookwiseError>;
