//! Availability evaluation - core conflict detection logic
//!
//! For one member and one requested window, six independent checks run in a
//! fixed order: working hours, date overrides, existing bookings, synced
//! calendar events, buffer zones, and booking quotas. All checks always run
//! so the caller sees the complete conflict list; the first conflict's
//! message doubles as the headline reason. Evaluation is a pure read, no
//! side effects, so identical inputs over unchanged data yield identical
//! results.

pub mod ports;

use std::sync::Arc;

use bookwise_domain::utils::timezone::{local_to_utc, resolve_day_start, utc_to_local};
use bookwise_domain::{
    AvailabilityRule, Booking, BookingStatus, BookwiseError, DateOverride, ExternalEvent,
    OverrideKind, Result,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use bookwise_domain::impl_status_conversions;
use ports::{
    AvailabilityRuleSource, BookingsSource, CalendarEventsSource, DateOverrideSource,
    MemberDirectory, WorkingHoursSource,
};

/// Which check produced a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    WorkingHours,
    DateOverride,
    BookingConflict,
    CalendarEvent,
    BufferTime,
    AvailabilityRule,
}

impl_status_conversions!(ConflictKind {
    WorkingHours => "working_hours",
    DateOverride => "date_override",
    BookingConflict => "booking_conflict",
    CalendarEvent => "calendar_event",
    BufferTime => "buffer_time",
    AvailabilityRule => "availability_rule",
});

/// One detected conflict with a human-readable reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
    /// Set for booking and buffer conflicts
    pub booking_id: Option<String>,
    /// Set for calendar event conflicts
    pub event_title: Option<String>,
}

impl Conflict {
    fn new(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), booking_id: None, event_title: None }
    }

    fn with_booking(mut self, booking_id: impl Into<String>) -> Self {
        self.booking_id = Some(booking_id.into());
        self
    }

    fn with_event_title(mut self, title: impl Into<String>) -> Self {
        self.event_title = Some(title.into());
        self
    }
}

/// The evaluator's verdict for one member and one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub available: bool,
    /// Conflicts in check order: working hours, date override, bookings,
    /// calendar events, buffers, quotas.
    pub conflicts: Vec<Conflict>,
    /// The first conflict's message, or `None` when available.
    pub primary_reason: Option<String>,
}

impl Evaluation {
    fn from_conflicts(conflicts: Vec<Conflict>) -> Self {
        let primary_reason = conflicts.first().map(|c| c.message.clone());
        Self { available: conflicts.is_empty(), conflicts, primary_reason }
    }
}

/// Result of a caller-side temporal guard (minimum notice, advance window)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl TemporalCheck {
    fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self { valid: false, reason: Some(reason.into()) }
    }
}

/// One member + one requested window
#[derive(Debug, Clone)]
pub struct AvailabilityRequest {
    pub member_id: String,
    /// IANA zone the wall-clock inputs are expressed in (department zone)
    pub zone: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    /// Lets a reschedule-in-place ignore its own prior slot
    pub exclude_booking: Option<String>,
}

impl AvailabilityRequest {
    pub fn new(
        member_id: impl Into<String>,
        zone: impl Into<String>,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i64,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            zone: zone.into(),
            date,
            start_time,
            duration_minutes,
            exclude_booking: None,
        }
    }

    pub fn excluding(mut self, booking_id: impl Into<String>) -> Self {
        self.exclude_booking = Some(booking_id.into());
        self
    }
}

/// Availability evaluator
pub struct AvailabilityService {
    members: Arc<dyn MemberDirectory>,
    working_hours: Arc<dyn WorkingHoursSource>,
    overrides: Arc<dyn DateOverrideSource>,
    bookings: Arc<dyn BookingsSource>,
    calendar: Arc<dyn CalendarEventsSource>,
    rules: Arc<dyn AvailabilityRuleSource>,
}

impl AvailabilityService {
    pub fn new(
        members: Arc<dyn MemberDirectory>,
        working_hours: Arc<dyn WorkingHoursSource>,
        overrides: Arc<dyn DateOverrideSource>,
        bookings: Arc<dyn BookingsSource>,
        calendar: Arc<dyn CalendarEventsSource>,
        rules: Arc<dyn AvailabilityRuleSource>,
    ) -> Self {
        Self { members, working_hours, overrides, bookings, calendar, rules }
    }

    /// Evaluate whether the member can take the requested window.
    ///
    /// All six checks run even after the first conflict; the result carries
    /// the complete ordered conflict list. Purely a read - persisting the
    /// booking and preventing the evaluate-then-commit race is the storage
    /// layer's job.
    pub async fn evaluate(&self, req: &AvailabilityRequest) -> Result<Evaluation> {
        if req.duration_minutes <= 0 {
            return Err(BookwiseError::InvalidInput(format!(
                "Duration must be positive, got {}",
                req.duration_minutes
            )));
        }

        let member = self
            .members
            .find_member(&req.member_id)
            .await?
            .ok_or_else(|| BookwiseError::MemberNotFound(req.member_id.clone()))?;
        if !member.is_enabled {
            return Err(BookwiseError::InvalidInput(format!(
                "Member '{}' is disabled",
                req.member_id
            )));
        }

        let start_naive = NaiveDateTime::new(req.date, req.start_time);
        let end_naive = start_naive + Duration::minutes(req.duration_minutes);
        let start_utc = local_to_utc(req.date, req.start_time, &req.zone)?;
        let end_utc = start_utc + Duration::minutes(req.duration_minutes);

        let date_override = self.overrides.override_for_date(&req.member_id, req.date).await?;
        let rule = self.rules.default_rule(&req.member_id).await?;

        let mut conflicts = Vec::new();

        // 1. Working hours. A date override replaces the weekly schedule
        //    for that date entirely, so the check is skipped when one exists.
        if date_override.is_none() {
            if let Some(conflict) = self.check_working_hours(req, start_naive, end_naive).await? {
                conflicts.push(conflict);
            }
        }

        // 2. Date override
        if let Some(ov) = &date_override {
            if let Some(conflict) = check_date_override(ov, req.date, start_naive, end_naive) {
                conflicts.push(conflict);
            }
        }

        // 3. Existing bookings
        let blocking = BookingStatus::blocking_statuses();
        let overlapping = self
            .bookings
            .find_overlapping(
                &req.member_id,
                start_utc,
                end_utc,
                blocking,
                req.exclude_booking.as_deref(),
            )
            .await?;
        for existing in &overlapping {
            conflicts.push(booking_conflict(existing, &req.zone)?);
        }

        // 4. Synced calendar events
        let events = self.calendar.blocking_events(&req.member_id, start_utc, end_utc).await?;
        for event in &events {
            conflicts.push(calendar_conflict(event, &req.zone)?);
        }

        // 5. Buffer zones
        conflicts.extend(
            self.check_buffers(req, rule.as_ref(), start_utc, end_utc).await?,
        );

        // 6. Quotas
        if let Some(conflict) = self.check_quota(req, rule.as_ref()).await? {
            conflicts.push(conflict);
        }

        debug!(
            member = %req.member_id,
            date = %req.date,
            conflicts = conflicts.len(),
            "availability evaluated"
        );

        Ok(Evaluation::from_conflicts(conflicts))
    }

    /// Minimum-notice guard. Deliberately outside the six checks because it
    /// depends on "now" at query time rather than static policy; callers
    /// run it right after a successful evaluation.
    pub async fn validate_minimum_notice(
        &self,
        member_id: &str,
        now: DateTime<Utc>,
        start: DateTime<Utc>,
    ) -> Result<TemporalCheck> {
        let Some(hours) = self
            .rules
            .default_rule(member_id)
            .await?
            .and_then(|r| r.min_notice_hours)
            .filter(|h| *h > 0)
        else {
            return Ok(TemporalCheck::ok());
        };

        if start < now + Duration::hours(hours) {
            Ok(TemporalCheck::rejected(format!(
                "Booking requires at least {hours} hours notice"
            )))
        } else {
            Ok(TemporalCheck::ok())
        }
    }

    /// Advance-window guard, the far-future counterpart of minimum notice.
    pub async fn validate_advance_window(
        &self,
        member_id: &str,
        today: NaiveDate,
        date: NaiveDate,
    ) -> Result<TemporalCheck> {
        let Some(days) = self
            .rules
            .default_rule(member_id)
            .await?
            .and_then(|r| r.max_days_advance)
            .filter(|d| *d > 0)
        else {
            return Ok(TemporalCheck::ok());
        };

        if date > today + Duration::days(days) {
            Ok(TemporalCheck::rejected(format!(
                "Booking is too far in advance (maximum {days} days)"
            )))
        } else {
            Ok(TemporalCheck::ok())
        }
    }

    async fn check_working_hours(
        &self,
        req: &AvailabilityRequest,
        start_naive: NaiveDateTime,
        end_naive: NaiveDateTime,
    ) -> Result<Option<Conflict>> {
        // No working hours on file means unconstrained.
        let Some(hours) = self.working_hours.working_hours(&req.member_id).await? else {
            return Ok(None);
        };

        let weekday = req.date.weekday();
        let day = hours.day(weekday);
        if !day.enabled {
            return Ok(Some(Conflict::new(
                ConflictKind::WorkingHours,
                format!("Member is not available on {}s", weekday_name(weekday)),
            )));
        }

        if outside_window(req.date, start_naive, end_naive, day.start, day.end) {
            return Ok(Some(Conflict::new(
                ConflictKind::WorkingHours,
                format!(
                    "Time is outside working hours ({} - {})",
                    day.start.format("%H:%M"),
                    day.end.format("%H:%M")
                ),
            )));
        }

        Ok(None)
    }

    /// Buffer semantics: every blocking booking near the request claims idle
    /// time on both sides - `buffer_after` behind its end, `buffer_before`
    /// ahead of its start - and the request needs its own buffers respected
    /// too. The gap between the request and a neighbor must therefore be at
    /// least the larger applicable buffer. A gap exactly equal to the buffer
    /// is allowed (half-open, consistent with the overlap rule).
    async fn check_buffers(
        &self,
        req: &AvailabilityRequest,
        rule: Option<&AvailabilityRule>,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Result<Vec<Conflict>> {
        let Some(rule) = rule.filter(|r| r.has_buffers()) else {
            return Ok(Vec::new());
        };
        let before = rule.buffer_before_minutes;
        let after = rule.buffer_after_minutes;
        let reach = before.max(after);

        let probe_start = start_utc - Duration::minutes(reach);
        let probe_end = end_utc + Duration::minutes(reach);
        let nearby = self
            .bookings
            .find_overlapping(
                &req.member_id,
                probe_start,
                probe_end,
                BookingStatus::blocking_statuses(),
                req.exclude_booking.as_deref(),
            )
            .await?;

        let mut conflicts = Vec::new();
        for neighbor in &nearby {
            // A core-window overlap is the booking-conflict check's finding.
            if neighbor.overlaps(start_utc, end_utc) {
                continue;
            }

            if neighbor.end <= start_utc {
                let gap = (start_utc - neighbor.end).num_minutes();
                if after > 0 && gap < after {
                    conflicts.push(
                        Conflict::new(
                            ConflictKind::BufferTime,
                            format!(
                                "Violates {after}-minute buffer after previous meeting \
                                 (conflicts with {})",
                                neighbor.booking_reference
                            ),
                        )
                        .with_booking(neighbor.id.as_str()),
                    );
                } else if before > 0 && gap < before {
                    conflicts.push(
                        Conflict::new(
                            ConflictKind::BufferTime,
                            format!(
                                "Violates {before}-minute buffer before meeting \
                                 (conflicts with {})",
                                neighbor.booking_reference
                            ),
                        )
                        .with_booking(neighbor.id.as_str()),
                    );
                }
            } else {
                let gap = (neighbor.start - end_utc).num_minutes();
                if before > 0 && gap < before {
                    conflicts.push(
                        Conflict::new(
                            ConflictKind::BufferTime,
                            format!(
                                "Violates {before}-minute buffer before next meeting \
                                 (conflicts with {})",
                                neighbor.booking_reference
                            ),
                        )
                        .with_booking(neighbor.id.as_str()),
                    );
                } else if after > 0 && gap < after {
                    conflicts.push(
                        Conflict::new(
                            ConflictKind::BufferTime,
                            format!(
                                "Violates {after}-minute buffer after meeting \
                                 (conflicts with {})",
                                neighbor.booking_reference
                            ),
                        )
                        .with_booking(neighbor.id.as_str()),
                    );
                }
            }
        }

        Ok(conflicts)
    }

    async fn check_quota(
        &self,
        req: &AvailabilityRequest,
        rule: Option<&AvailabilityRule>,
    ) -> Result<Option<Conflict>> {
        let Some(rule) = rule else {
            return Ok(None);
        };
        let blocking = BookingStatus::blocking_statuses();

        if let Some(cap) = rule.daily_cap() {
            let day_start = resolve_day_start(req.date, &req.zone)?;
            let day_end = resolve_day_start(req.date + Duration::days(1), &req.zone)?;
            let count = self
                .bookings
                .count_between(&req.member_id, day_start, day_end, blocking)
                .await?;
            if count >= cap {
                return Ok(Some(Conflict::new(
                    ConflictKind::AvailabilityRule,
                    format!("Member has reached maximum bookings per day ({cap})"),
                )));
            }
        }

        if let Some(cap) = rule.weekly_cap() {
            // Mon-Sun week containing the requested date
            let week_start_date =
                req.date - Duration::days(i64::from(req.date.weekday().num_days_from_monday()));
            let week_start = resolve_day_start(week_start_date, &req.zone)?;
            let week_end = resolve_day_start(week_start_date + Duration::days(7), &req.zone)?;
            let count = self
                .bookings
                .count_between(&req.member_id, week_start, week_end, blocking)
                .await?;
            if count >= cap {
                return Ok(Some(Conflict::new(
                    ConflictKind::AvailabilityRule,
                    format!("Member has reached maximum bookings per week ({cap})"),
                )));
            }
        }

        Ok(None)
    }
}

fn check_date_override(
    ov: &DateOverride,
    date: NaiveDate,
    start_naive: NaiveDateTime,
    end_naive: NaiveDateTime,
) -> Option<Conflict> {
    match ov.kind {
        OverrideKind::Unavailable => Some(Conflict::new(
            ConflictKind::DateOverride,
            ov.reason
                .clone()
                .unwrap_or_else(|| "Member is not available on this date".into()),
        )),
        OverrideKind::CustomHours { start, end } => {
            if outside_window(date, start_naive, end_naive, start, end) {
                Some(Conflict::new(
                    ConflictKind::DateOverride,
                    format!(
                        "Time is outside custom hours for this date ({} - {})",
                        start.format("%H:%M"),
                        end.format("%H:%M")
                    ),
                ))
            } else {
                None
            }
        }
    }
}

fn booking_conflict(existing: &Booking, zone: &str) -> Result<Conflict> {
    let start = utc_to_local(existing.start, zone)?;
    let end = utc_to_local(existing.end, zone)?;
    Ok(Conflict::new(
        ConflictKind::BookingConflict,
        format!(
            "Conflicts with existing booking {} ({} - {})",
            existing.booking_reference,
            start.format("%H:%M"),
            end.format("%H:%M")
        ),
    )
    .with_booking(existing.id.as_str()))
}

fn calendar_conflict(event: &ExternalEvent, zone: &str) -> Result<Conflict> {
    let start = utc_to_local(event.start, zone)?;
    let end = utc_to_local(event.end, zone)?;
    let title = event.display_title();
    Ok(Conflict::new(
        ConflictKind::CalendarEvent,
        format!(
            "Conflicts with calendar event: {title} ({} - {})",
            start.format("%H:%M"),
            end.format("%H:%M")
        ),
    )
    .with_event_title(title))
}

/// Whether `[start, end)` falls outside the `[win_start, win_end]` same-day
/// window. A request spilling past midnight is always outside.
fn outside_window(
    date: NaiveDate,
    start_naive: NaiveDateTime,
    end_naive: NaiveDateTime,
    win_start: NaiveTime,
    win_end: NaiveTime,
) -> bool {
    if start_naive.time() < win_start {
        return true;
    }
    if end_naive.date() > date {
        return true;
    }
    end_naive.time() > win_end
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
