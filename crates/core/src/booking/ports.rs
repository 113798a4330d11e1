//! Port interfaces for booking persistence

use async_trait::async_trait;
use bookwise_domain::{AssignmentHistoryEntry, Booking, BookingHistoryEntry, Result};

/// Booking persistence with commit-time conflict enforcement
///
/// Evaluation and persistence are two separate steps; between them another
/// request can win the same slot. `insert` is therefore required to re-check
/// for an overlapping non-terminal booking inside one storage-level atomic
/// unit (exclusion constraint, serialized transaction, or equivalent) and
/// fail with the retryable `BookingConflict` error when it loses the race.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist a new booking, atomically guarding against a concurrently
    /// committed overlap for any assigned member.
    ///
    /// # Errors
    /// `BookwiseError::BookingConflict` when an overlapping non-terminal
    /// booking was committed first; the caller should re-run evaluation
    /// before retrying.
    async fn insert(&self, booking: &Booking) -> Result<()>;

    /// Persist changes to an existing booking. Reschedules must apply the
    /// same overlap guard as `insert`, excluding the booking itself.
    async fn update(&self, booking: &Booking) -> Result<()>;

    async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>>;

    async fn find_by_cancel_token(&self, token: &str) -> Result<Option<Booking>>;

    async fn find_by_reschedule_token(&self, token: &str) -> Result<Option<Booking>>;

    /// Append an immutable lifecycle history entry.
    async fn append_history(&self, entry: &BookingHistoryEntry) -> Result<()>;

    /// Append an immutable assignment-change entry.
    async fn append_assignment_history(&self, entry: &AssignmentHistoryEntry) -> Result<()>;
}
