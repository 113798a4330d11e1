//! Booking lifecycle - creation, self-service mutations, status transitions
//!
//! Every mutating operation takes the acting identity explicitly and appends
//! an immutable history entry. Policy conflicts surface as `SlotUnavailable`
//! with the evaluator's headline reason; commit-time races surface as the
//! retryable `BookingConflict` raised by the store.

pub mod ports;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bookwise_domain::constants::{
    BOOKING_REFERENCE_LENGTH, BOOKING_REFERENCE_PREFIX, SELF_SERVICE_TOKEN_BYTES,
};
use bookwise_domain::utils::timezone::{local_to_utc, utc_to_local};
use bookwise_domain::{
    AssignedMember, AssignmentAction, AssignmentHistoryEntry, Booking, BookingHistoryEntry,
    BookingStatus, BookwiseError, Customer, Department, Result,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use crate::assignment::ports::DepartmentSource;
use crate::availability::{AvailabilityRequest, AvailabilityService};
use crate::slots::ports::MeetingTypeSource;
use ports::BookingStore;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// A member to assign on a new booking
#[derive(Debug, Clone)]
pub struct NewBookingMember {
    pub member_id: String,
    pub is_primary_host: bool,
}

/// Inputs for creating a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub department_id: String,
    pub meeting_type_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub members: Vec<NewBookingMember>,
    /// Required unless `is_internal`
    pub customer: Option<Customer>,
    pub is_internal: bool,
    /// Acting identity recorded in history and assignment audit fields
    pub actor: String,
}

/// Booking lifecycle service
pub struct BookingLifecycleService {
    store: Arc<dyn BookingStore>,
    departments: Arc<dyn DepartmentSource>,
    meeting_types: Arc<dyn MeetingTypeSource>,
    availability: Arc<AvailabilityService>,
}

impl BookingLifecycleService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        departments: Arc<dyn DepartmentSource>,
        meeting_types: Arc<dyn MeetingTypeSource>,
        availability: Arc<AvailabilityService>,
    ) -> Self {
        Self { store, departments, meeting_types, availability }
    }

    /// Validate and persist a new booking.
    ///
    /// # Errors
    /// - `SlotUnavailable` when any assigned member fails evaluation or a
    ///   temporal guard (policy rejection, pick another slot)
    /// - `BookingConflict` when a concurrent booking won the slot between
    ///   evaluation and commit (retry after re-evaluating)
    pub async fn create_booking(&self, new: NewBooking, now: DateTime<Utc>) -> Result<Booking> {
        let department = self.department(&new.department_id).await?;
        let meeting_type = self
            .meeting_types
            .find_meeting_type(&new.meeting_type_id)
            .await?
            .filter(|mt| mt.is_active)
            .ok_or_else(|| {
                BookwiseError::NotFound(format!(
                    "Meeting type '{}' not found or inactive",
                    new.meeting_type_id
                ))
            })?;

        if new.is_internal && !meeting_type.is_internal {
            return Err(BookwiseError::InvalidInput(format!(
                "Meeting type '{}' is not available for internal meetings",
                meeting_type.name
            )));
        }
        if !new.is_internal && !meeting_type.is_public {
            return Err(BookwiseError::InvalidInput(format!(
                "Meeting type '{}' is not available for public bookings",
                meeting_type.name
            )));
        }

        let duration = meeting_type.duration_minutes;
        if duration <= 0 {
            return Err(BookwiseError::InvalidInput(format!(
                "Meeting type '{}' has no positive duration",
                meeting_type.name
            )));
        }

        let start = local_to_utc(new.date, new.start_time, &department.timezone)?;
        let end = start + Duration::minutes(duration);
        if start < now {
            return Err(BookwiseError::InvalidInput(
                "Cannot create a booking in the past. Please select a future date and time."
                    .into(),
            ));
        }

        validate_customer(new.is_internal, new.customer.as_ref())?;
        validate_assigned(&new.members)?;

        for member in &new.members {
            if !self
                .departments
                .is_active_member(&new.department_id, &member.member_id)
                .await?
            {
                return Err(BookwiseError::InvalidInput(format!(
                    "Member '{}' is not an active member of department '{}'",
                    member.member_id, department.name
                )));
            }

            let request = AvailabilityRequest::new(
                member.member_id.as_str(),
                department.timezone.as_str(),
                new.date,
                new.start_time,
                duration,
            );
            let evaluation = self.availability.evaluate(&request).await?;
            if !evaluation.available {
                return Err(BookwiseError::SlotUnavailable(format!(
                    "{} ({})",
                    evaluation
                        .primary_reason
                        .unwrap_or_else(|| "Member is not available".into()),
                    member.member_id
                )));
            }

            let notice = self
                .availability
                .validate_minimum_notice(&member.member_id, now, start)
                .await?;
            if !notice.valid {
                return Err(BookwiseError::SlotUnavailable(
                    notice.reason.unwrap_or_else(|| "Minimum notice not met".into()),
                ));
            }

            let today = utc_to_local(now, &department.timezone)?.date_naive();
            let advance = self
                .availability
                .validate_advance_window(&member.member_id, today, new.date)
                .await?;
            if !advance.valid {
                return Err(BookwiseError::SlotUnavailable(
                    advance.reason.unwrap_or_else(|| "Too far in advance".into()),
                ));
            }
        }

        let status = if meeting_type.requires_approval {
            BookingStatus::Pending
        } else {
            BookingStatus::Confirmed
        };

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            department_id: new.department_id,
            meeting_type_id: new.meeting_type_id,
            title: new.title,
            start,
            end,
            status,
            assigned: new
                .members
                .iter()
                .map(|m| AssignedMember {
                    member_id: m.member_id.clone(),
                    is_primary_host: m.is_primary_host,
                    assigned_by: new.actor.clone(),
                    assigned_at: now,
                })
                .collect(),
            customer: new.customer,
            is_internal: new.is_internal,
            booking_reference: generate_reference(),
            cancel_token: generate_token(),
            reschedule_token: generate_token(),
            cancellation_reason: None,
            cancelled_at: None,
            created_by: new.actor.clone(),
            created_at: now,
        };

        self.store.insert(&booking).await?;
        self.record_history(&booking, "created", &new.actor, now, {
            format!("Booking created for {}", booking.title)
        })
        .await?;

        info!(booking = %booking.id, reference = %booking.booking_reference, "booking created");
        Ok(booking)
    }

    /// Cancel a booking through its self-service cancel token.
    pub async fn cancel_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Booking> {
        let mut booking = self
            .store
            .find_by_cancel_token(token)
            .await?
            .ok_or_else(|| {
                BookwiseError::NotFound("Invalid or expired cancellation link".into())
            })?;
        reject_terminal(&booking)?;

        let previous = booking.status;
        booking.status = BookingStatus::Cancelled;
        booking.cancellation_reason = Some("Customer cancelled".into());
        booking.cancelled_at = Some(now);
        self.store.update(&booking).await?;
        self.record_history(&booking, "cancelled", "customer", now, {
            format!("Booking status changed from {previous} to {}", booking.status)
        })
        .await?;

        info!(booking = %booking.id, "booking cancelled via token");
        Ok(booking)
    }

    /// Move a booking to a new window through its reschedule token.
    ///
    /// The prior slot is excluded from conflict checks so a booking can move
    /// within its own window.
    pub async fn reschedule_by_token(
        &self,
        token: &str,
        new_date: NaiveDate,
        new_time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let booking = self
            .store
            .find_by_reschedule_token(token)
            .await?
            .ok_or_else(|| BookwiseError::NotFound("Invalid or expired link".into()))?;
        reject_terminal(&booking)?;

        self.reschedule(booking, new_date, new_time, "customer", now).await
    }

    /// Staff-side reschedule by booking id.
    pub async fn reschedule_booking(
        &self,
        booking_id: &str,
        new_date: NaiveDate,
        new_time: NaiveTime,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let booking = self.require_booking(booking_id).await?;
        reject_terminal(&booking)?;
        self.reschedule(booking, new_date, new_time, actor, now).await
    }

    /// Apply a status transition with its side fields and audit entry.
    pub async fn update_status(
        &self,
        booking_id: &str,
        new_status: BookingStatus,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut booking = self.require_booking(booking_id).await?;
        if booking.status == new_status {
            return Ok(booking);
        }

        // No-show and completed describe the past; a future booking cannot
        // have either yet.
        if matches!(new_status, BookingStatus::NoShow | BookingStatus::Completed)
            && booking.start > now
        {
            return Err(BookwiseError::InvalidInput(format!(
                "Cannot mark a future booking as '{new_status}'"
            )));
        }

        let previous = booking.status;
        booking.status = new_status;
        if new_status == BookingStatus::Cancelled {
            booking.cancelled_at = Some(now);
            booking.cancellation_reason =
                Some(notes.unwrap_or("Cancelled by staff").to_string());
        }

        self.store.update(&booking).await?;
        self.record_history(&booking, "status-changed", actor, now, {
            format!("Booking status changed from {previous} to {new_status}")
        })
        .await?;

        Ok(booking)
    }

    /// Replace the primary host with a different active department member.
    pub async fn reassign(
        &self,
        booking_id: &str,
        new_member_id: &str,
        actor: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut booking = self.require_booking(booking_id).await?;
        reject_terminal(&booking)?;

        let department = self.department(&booking.department_id).await?;
        if !self
            .departments
            .is_active_member(&booking.department_id, new_member_id)
            .await?
        {
            return Err(BookwiseError::InvalidInput(format!(
                "Member '{new_member_id}' is not an active member of department '{}'",
                department.name
            )));
        }

        let local_start = utc_to_local(booking.start, &department.timezone)?;
        let request = AvailabilityRequest::new(
            new_member_id,
            department.timezone.as_str(),
            local_start.date_naive(),
            local_start.time(),
            booking.duration_minutes(),
        )
        .excluding(booking.id.as_str());
        let evaluation = self.availability.evaluate(&request).await?;
        if !evaluation.available {
            return Err(BookwiseError::SlotUnavailable(
                evaluation
                    .primary_reason
                    .unwrap_or_else(|| "Member is not available".into()),
            ));
        }

        let outgoing = booking.primary_host().map(|m| m.member_id.clone());
        booking.assigned.retain(|m| !m.is_primary_host);
        booking.assigned.push(AssignedMember {
            member_id: new_member_id.to_string(),
            is_primary_host: true,
            assigned_by: actor.to_string(),
            assigned_at: now,
        });
        self.store.update(&booking).await?;

        if let Some(previous) = &outgoing {
            self.record_assignment_change(
                &booking,
                AssignmentAction::Unassigned,
                previous,
                actor,
                reason,
                now,
            )
            .await?;
        }
        self.record_assignment_change(
            &booking,
            AssignmentAction::Assigned,
            new_member_id,
            actor,
            reason,
            now,
        )
        .await?;
        self.record_assignment_change(
            &booking,
            AssignmentAction::PrimaryChanged,
            new_member_id,
            actor,
            reason,
            now,
        )
        .await?;

        info!(
            booking = %booking.id,
            from = outgoing.as_deref().unwrap_or("none"),
            to = %new_member_id,
            "booking reassigned"
        );
        Ok(booking)
    }

    async fn reschedule(
        &self,
        mut booking: Booking,
        new_date: NaiveDate,
        new_time: NaiveTime,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let department = self.department(&booking.department_id).await?;
        let duration = booking.duration_minutes();

        let new_start = local_to_utc(new_date, new_time, &department.timezone)?;
        if new_start < now {
            return Err(BookwiseError::InvalidInput(
                "Cannot reschedule to a date in the past".into(),
            ));
        }

        for assigned in &booking.assigned {
            let request = AvailabilityRequest::new(
                assigned.member_id.as_str(),
                department.timezone.as_str(),
                new_date,
                new_time,
                duration,
            )
            .excluding(booking.id.as_str());
            let evaluation = self.availability.evaluate(&request).await?;
            if !evaluation.available {
                return Err(BookwiseError::SlotUnavailable(format!(
                    "{} ({})",
                    evaluation
                        .primary_reason
                        .unwrap_or_else(|| "Member is not available".into()),
                    assigned.member_id
                )));
            }
        }

        let old_window =
            format!("{} - {}", booking.start.format("%Y-%m-%d %H:%M"), booking.end.format("%H:%M"));
        booking.start = new_start;
        booking.end = new_start + Duration::minutes(duration);
        self.store.update(&booking).await?;
        self.record_history(&booking, "rescheduled", actor, now, {
            format!(
                "Booking moved from {old_window} UTC to {} - {} UTC",
                booking.start.format("%Y-%m-%d %H:%M"),
                booking.end.format("%H:%M")
            )
        })
        .await?;

        info!(booking = %booking.id, "booking rescheduled");
        Ok(booking)
    }

    async fn department(&self, department_id: &str) -> Result<Department> {
        self.departments
            .find_department(department_id)
            .await?
            .ok_or_else(|| {
                BookwiseError::NotFound(format!("Department '{department_id}' not found"))
            })
    }

    async fn require_booking(&self, booking_id: &str) -> Result<Booking> {
        self.store
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| BookwiseError::NotFound(format!("Booking '{booking_id}' not found")))
    }

    async fn record_history(
        &self,
        booking: &Booking,
        event_type: &str,
        actor: &str,
        now: DateTime<Utc>,
        description: String,
    ) -> Result<()> {
        self.store
            .append_history(&BookingHistoryEntry {
                id: Uuid::new_v4().to_string(),
                booking_id: booking.id.clone(),
                event_type: event_type.to_string(),
                occurred_at: now,
                actor: actor.to_string(),
                description,
            })
            .await
    }

    async fn record_assignment_change(
        &self,
        booking: &Booking,
        action: AssignmentAction,
        member_id: &str,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .append_assignment_history(&AssignmentHistoryEntry {
                id: Uuid::new_v4().to_string(),
                booking_id: booking.id.clone(),
                action,
                member_id: member_id.to_string(),
                occurred_at: now,
                actor: actor.to_string(),
                notes: notes.map(str::to_string),
            })
            .await
    }
}

/// Self-service mutations against a finished booking fail with the booking's
/// actual state in the message, never a generic error.
fn reject_terminal(booking: &Booking) -> Result<()> {
    if booking.status.is_terminal() {
        Err(BookwiseError::InvalidInput(format!(
            "This booking has already been {}",
            booking.status
        )))
    } else {
        Ok(())
    }
}

fn validate_customer(is_internal: bool, customer: Option<&Customer>) -> Result<()> {
    if is_internal {
        return Ok(());
    }
    let customer = customer.ok_or_else(|| {
        BookwiseError::InvalidInput("Customer details are required for external bookings".into())
    })?;
    if customer.name.trim().is_empty() {
        return Err(BookwiseError::InvalidInput(
            "Customer name is required for external bookings".into(),
        ));
    }
    if !EMAIL_RE.is_match(&customer.email) {
        return Err(BookwiseError::InvalidInput(format!(
            "Invalid email format: '{}'",
            customer.email
        )));
    }
    if let Some(phone) = &customer.phone {
        let digits: String =
            phone.chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+')).collect();
        if digits.len() < 7 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(BookwiseError::InvalidInput(
                "Invalid phone number format".into(),
            ));
        }
    }
    Ok(())
}

fn validate_assigned(members: &[NewBookingMember]) -> Result<()> {
    if members.is_empty() {
        return Err(BookwiseError::InvalidInput(
            "At least one member must be assigned to this booking".into(),
        ));
    }

    let mut ids: Vec<&str> = members.iter().map(|m| m.member_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != members.len() {
        return Err(BookwiseError::InvalidInput(
            "Each member can only be assigned once".into(),
        ));
    }

    let primary_count = members.iter().filter(|m| m.is_primary_host).count();
    if primary_count != 1 {
        return Err(BookwiseError::InvalidInput(format!(
            "Exactly one assigned member must be the primary host, found {primary_count}"
        )));
    }

    Ok(())
}

fn generate_token() -> String {
    let mut bytes = [0u8; SELF_SERVICE_TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOOKING_REFERENCE_LENGTH)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("{BOOKING_REFERENCE_PREFIX}{suffix}")
}
