//! Port interfaces for the availability evaluator
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations. Each conflict source is an
//! independent read-only adapter; the evaluator never mutates state.

use async_trait::async_trait;
use bookwise_domain::{
    AvailabilityRule, Booking, BookingStatus, DateOverride, ExternalEvent, Member, Result,
    WorkingHours,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Member directory lookup
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Find a member by id; `None` when no such member exists.
    async fn find_member(&self, member_id: &str) -> Result<Option<Member>>;
}

/// Recurring weekly schedule source
#[async_trait]
pub trait WorkingHoursSource: Send + Sync {
    /// The member's weekly schedule, or `None` when nothing is configured
    /// (which the evaluator treats as unconstrained).
    async fn working_hours(&self, member_id: &str) -> Result<Option<WorkingHours>>;
}

/// Per-date schedule exception source
#[async_trait]
pub trait DateOverrideSource: Send + Sync {
    /// The at-most-one override for this member and date.
    async fn override_for_date(
        &self,
        member_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DateOverride>>;
}

/// Existing bookings source
#[async_trait]
pub trait BookingsSource: Send + Sync {
    /// Bookings assigned to the member whose `[start, end)` overlaps the
    /// given window and whose status is in `statuses`, minus `exclude`.
    async fn find_overlapping(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<&str>,
    ) -> Result<Vec<Booking>>;

    /// Count of the member's bookings starting inside `[start, end)` with a
    /// status in `statuses`. Used for quotas and workload ranking.
    async fn count_between(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
    ) -> Result<u32>;
}

/// Synced external calendar events source
#[async_trait]
pub trait CalendarEventsSource: Send + Sync {
    /// Events for the member overlapping the window that are blocking,
    /// timed (not all-day), and successfully synced.
    async fn blocking_events(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>>;
}

/// Availability rule source
#[async_trait]
pub trait AvailabilityRuleSource: Send + Sync {
    /// The member's default rule, or `None` meaning unconstrained.
    async fn default_rule(&self, member_id: &str) -> Result<Option<AvailabilityRule>>;
}
