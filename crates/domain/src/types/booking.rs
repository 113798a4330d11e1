//! Booking types and lifecycle records
//!
//! A booking reserves a half-open UTC window `[start, end)` for one or more
//! assigned members. Every mutation appends an immutable history entry that
//! records the acting identity explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
    Rescheduled,
}

impl_status_conversions!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
    NoShow => "no-show",
    Rescheduled => "rescheduled",
});

impl BookingStatus {
    /// Terminal statuses end the booking's life; self-service mutations
    /// against them are rejected.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Any non-terminal booking still reserves its slot.
    pub fn blocks_availability(self) -> bool {
        !self.is_terminal()
    }

    /// The set of statuses that count toward conflict and quota checks.
    pub fn blocking_statuses() -> &'static [Self] {
        &[Self::Pending, Self::Confirmed, Self::NoShow, Self::Rescheduled]
    }
}

/// A member assigned to host a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedMember {
    pub member_id: String,
    /// Exactly one assigned member per booking carries this flag.
    pub is_primary_host: bool,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Customer identity for external bookings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// The reserved slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub department_id: String,
    pub meeting_type_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
    pub assigned: Vec<AssignedMember>,
    /// `None` for internal bookings
    pub customer: Option<Customer>,
    pub is_internal: bool,
    /// Human-friendly reference quoted in customer communication
    pub booking_reference: String,
    /// Opaque single-purpose tokens for self-service cancel/reschedule
    pub cancel_token: String,
    pub reschedule_token: String,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn primary_host(&self) -> Option<&AssignedMember> {
        self.assigned.iter().find(|m| m.is_primary_host)
    }

    /// Half-open interval overlap: `self.start < end && self.end > start`.
    /// Back-to-back bookings do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Immutable audit record appended on every booking mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingHistoryEntry {
    pub id: String,
    pub booking_id: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    /// Who performed the mutation; never read from ambient session state.
    pub actor: String,
    pub description: String,
}

/// What happened to an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentAction {
    Assigned,
    Unassigned,
    PrimaryChanged,
}

impl_status_conversions!(AssignmentAction {
    Assigned => "assigned",
    Unassigned => "unassigned",
    PrimaryChanged => "primary-changed",
});

/// Audit record for assignment changes on a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentHistoryEntry {
    pub id: String,
    pub booking_id: String,
    pub action: AssignmentAction,
    pub member_id: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: String,
    pub notes: Option<String>,
}
