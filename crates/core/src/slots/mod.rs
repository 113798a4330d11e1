//! Slot and date enumeration for the public booking surface
//!
//! A date is available when at least one active member passes a cheap
//! pre-check (weekday enabled, no blanket unavailable override, inside the
//! member's advance-booking window). A time slot is available when at least
//! one active member passes the full evaluator AND the minimum-notice guard
//! for that slot's absolute instant.
//!
//! Member identities are redacted from public responses; only counts are
//! shown.

pub mod ports;

use std::sync::Arc;

use bookwise_domain::config::BookingConfig;
use bookwise_domain::utils::timezone::{format_window, local_to_utc, utc_to_local};
use bookwise_domain::{BookwiseError, Department, MeetingType, OverrideKind, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::availability::ports::{DateOverrideSource, WorkingHoursSource};
use crate::availability::{AvailabilityRequest, AvailabilityService};
use crate::assignment::ports::DepartmentSource;
use ports::MeetingTypeSource;

/// Who is asking; drives member-identity redaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Unauthenticated visitor - member identities are hidden
    Public,
    /// Authenticated staff - member identities are returned
    Staff,
}

/// Dates in a month with at least one potentially available member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDates {
    pub dates: Vec<NaiveDate>,
    pub timezone: String,
    pub department: String,
    pub meeting_type: String,
}

/// One bookable time slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotView {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_utc: DateTime<Utc>,
    pub available_member_count: usize,
    /// `None` for public callers
    pub available_members: Option<Vec<String>>,
    /// Present when the visitor's timezone differs from the department's
    pub visitor_display: Option<String>,
}

/// All available slots for one date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub timezone: String,
    pub visitor_timezone: Option<String>,
    pub slots: Vec<SlotView>,
}

/// Slot/date enumerator
pub struct SlotService {
    departments: Arc<dyn DepartmentSource>,
    meeting_types: Arc<dyn MeetingTypeSource>,
    working_hours: Arc<dyn WorkingHoursSource>,
    overrides: Arc<dyn DateOverrideSource>,
    availability: Arc<AvailabilityService>,
    config: BookingConfig,
}

impl SlotService {
    pub fn new(
        departments: Arc<dyn DepartmentSource>,
        meeting_types: Arc<dyn MeetingTypeSource>,
        working_hours: Arc<dyn WorkingHoursSource>,
        overrides: Arc<dyn DateOverrideSource>,
        availability: Arc<AvailabilityService>,
        config: BookingConfig,
    ) -> Self {
        Self { departments, meeting_types, working_hours, overrides, availability, config }
    }

    /// Dates in `month`/`year` where at least one active member could host
    /// the meeting type. Past dates are skipped; the check per member is the
    /// cheap one (weekday enabled, no blanket override, advance window) -
    /// slot-level certainty comes from `available_slots`.
    pub async fn available_dates(
        &self,
        department_slug: &str,
        meeting_type_slug: &str,
        month: u32,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<AvailableDates> {
        let (department, meeting_type) =
            self.lookup_public_target(department_slug, meeting_type_slug).await?;
        let members = self.departments.active_members(&department.id).await?;

        let today = utc_to_local(now, &department.timezone)?.date_naive();
        let mut dates = Vec::new();

        let mut current = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            BookwiseError::InvalidInput(format!("Invalid month {year}-{month:02}"))
        })?;
        while current.month() == month {
            if current >= today {
                for member in &members {
                    let advance = self
                        .availability
                        .validate_advance_window(&member.member_id, today, current)
                        .await?;
                    if !advance.valid {
                        continue;
                    }
                    if self.member_may_have_availability(&member.member_id, current).await? {
                        dates.push(current);
                        break;
                    }
                }
            }
            current = match current.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(AvailableDates {
            dates,
            timezone: department.timezone,
            department: department.name,
            meeting_type: meeting_type.name,
        })
    }

    /// Slots on `date` where at least one active member is available and
    /// within notice. The scan covers the configured business-hours window
    /// quantized by the meeting type's duration. Wall-clock times erased by
    /// a DST transition are skipped - they cannot be offered.
    pub async fn available_slots(
        &self,
        department_slug: &str,
        meeting_type_slug: &str,
        date: NaiveDate,
        visitor_timezone: Option<&str>,
        audience: Audience,
        now: DateTime<Utc>,
    ) -> Result<DaySlots> {
        let (department, meeting_type) =
            self.lookup_public_target(department_slug, meeting_type_slug).await?;
        let members = self.departments.active_members(&department.id).await?;

        let duration = if meeting_type.duration_minutes > 0 {
            meeting_type.duration_minutes
        } else {
            self.config.default_slot_interval_minutes
        };

        let mut slots = Vec::new();
        for slot_time in self.scan_times(duration) {
            let start_utc = match local_to_utc(date, slot_time, &department.timezone) {
                Ok(instant) => instant,
                Err(
                    BookwiseError::NonexistentLocalTime { .. }
                    | BookwiseError::AmbiguousLocalTime { .. },
                ) => {
                    debug!(%date, slot = %slot_time, "slot skipped: DST transition");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut available_members = Vec::new();
            for member in &members {
                let request = AvailabilityRequest::new(
                    member.member_id.as_str(),
                    department.timezone.as_str(),
                    date,
                    slot_time,
                    duration,
                );
                if !self.availability.evaluate(&request).await?.available {
                    continue;
                }
                let notice = self
                    .availability
                    .validate_minimum_notice(&member.member_id, now, start_utc)
                    .await?;
                if notice.valid {
                    available_members.push(member.member_id.clone());
                }
            }

            if available_members.is_empty() {
                continue;
            }

            let end_utc = start_utc + Duration::minutes(duration);
            let visitor_display = match visitor_timezone {
                Some(visitor) if visitor != department.timezone => {
                    Some(format_window(start_utc, end_utc, &department.timezone, Some(visitor))?)
                }
                _ => None,
            };

            slots.push(SlotView {
                start_time: slot_time,
                end_time: utc_to_local(end_utc, &department.timezone)?.time(),
                start_utc,
                available_member_count: available_members.len(),
                available_members: match audience {
                    Audience::Public => None,
                    Audience::Staff => Some(available_members),
                },
                visitor_display,
            });
        }

        Ok(DaySlots {
            date,
            timezone: department.timezone,
            visitor_timezone: visitor_timezone.map(str::to_string),
            slots,
        })
    }

    /// Cheap date-level pre-check: weekday enabled (or no schedule on file)
    /// and no blanket unavailable override.
    async fn member_may_have_availability(
        &self,
        member_id: &str,
        date: NaiveDate,
    ) -> Result<bool> {
        if let Some(hours) = self.working_hours.working_hours(member_id).await? {
            if !hours.is_enabled(date.weekday()) {
                return Ok(false);
            }
        }

        if let Some(ov) = self.overrides.override_for_date(member_id, date).await? {
            if matches!(ov.kind, OverrideKind::Unavailable) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn lookup_public_target(
        &self,
        department_slug: &str,
        meeting_type_slug: &str,
    ) -> Result<(Department, MeetingType)> {
        let department = self
            .departments
            .find_department_by_slug(department_slug)
            .await?
            .filter(|d| d.is_active)
            .ok_or_else(|| {
                BookwiseError::NotFound(format!(
                    "Department '{department_slug}' not found or inactive"
                ))
            })?;

        let meeting_type = self
            .meeting_types
            .find_by_slug(&department.id, meeting_type_slug)
            .await?
            .filter(|mt| mt.is_active && mt.is_public)
            .ok_or_else(|| {
                BookwiseError::NotFound(format!(
                    "Meeting type '{meeting_type_slug}' not found or inactive"
                ))
            })?;

        Ok((department, meeting_type))
    }

    fn scan_times(&self, interval_minutes: i64) -> Vec<NaiveTime> {
        let mut times = Vec::new();
        let mut minutes = i64::from(self.config.slot_window_start_hour) * 60;
        let end = i64::from(self.config.slot_window_end_hour) * 60;
        while minutes <= end {
            if let Some(time) =
                NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
            {
                times.push(time);
            }
            minutes += interval_minutes.max(1);
        }
        times
    }
}
