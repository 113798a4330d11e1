//! Member, working hours, and availability rule types
//!
//! Working hours are a fixed-size weekly schedule rather than a loosely
//! parsed document: all seven days are always present and indexed by a
//! closed weekday type, so a missing day cannot be represented.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::{BookwiseError, Result};

/// A staff user eligible to host meetings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub email: String,
    pub full_name: String,
    /// IANA timezone name, e.g. "Europe/Copenhagen"
    pub timezone: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// One weekday's bookable window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DaySchedule {
    /// A disabled day; start/end carry no meaning.
    pub fn off() -> Self {
        Self { enabled: false, start: NaiveTime::MIN, end: NaiveTime::MIN }
    }

    pub fn working(start: NaiveTime, end: NaiveTime) -> Self {
        Self { enabled: true, start, end }
    }
}

/// A member's recurring weekly schedule. Exactly seven entries, Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    days: [DaySchedule; 7],
}

impl WorkingHours {
    /// Build a schedule from seven Monday-first entries.
    ///
    /// At least one day must be enabled; a schedule with every day disabled
    /// is a configuration mistake, not "never available" (delete the record
    /// instead to mean unconstrained).
    pub fn new(days: [DaySchedule; 7]) -> Result<Self> {
        if days.iter().any(|d| d.enabled) {
            Ok(Self { days })
        } else {
            Err(BookwiseError::InvalidInput(
                "Working hours must have at least one enabled day".into(),
            ))
        }
    }

    /// Monday-Friday 09:00-17:00.
    pub fn standard_business() -> Self {
        let nine_to_five = DaySchedule::working(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
        );
        Self {
            days: [
                nine_to_five,
                nine_to_five,
                nine_to_five,
                nine_to_five,
                nine_to_five,
                DaySchedule::off(),
                DaySchedule::off(),
            ],
        }
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn is_enabled(&self, weekday: Weekday) -> bool {
        self.day(weekday).enabled
    }

    pub fn days(&self) -> &[DaySchedule; 7] {
        &self.days
    }
}

/// What a date override does to the member's schedule for that date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideKind {
    /// The member cannot be booked at all on this date.
    Unavailable,
    /// The member can only be booked within this window, regardless of
    /// their regular working hours.
    CustomHours { start: NaiveTime, end: NaiveTime },
}

/// A per-date exception to a member's working hours.
/// At most one override exists per (member, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateOverride {
    pub id: String,
    pub member_id: String,
    pub date: NaiveDate,
    pub kind: OverrideKind,
    pub reason: Option<String>,
}

/// Per-member booking policy bundle
///
/// Zero or `None` for any cap means unlimited; a member with no default
/// rule on file is unconstrained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: String,
    pub member_id: String,
    pub buffer_before_minutes: i64,
    pub buffer_after_minutes: i64,
    pub max_bookings_per_day: Option<u32>,
    pub max_bookings_per_week: Option<u32>,
    pub min_notice_hours: Option<i64>,
    pub max_days_advance: Option<i64>,
    pub is_default: bool,
}

impl AvailabilityRule {
    /// An unconstrained rule, useful as a base for tests and defaults.
    pub fn unconstrained(member_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            member_id: member_id.into(),
            buffer_before_minutes: 0,
            buffer_after_minutes: 0,
            max_bookings_per_day: None,
            max_bookings_per_week: None,
            min_notice_hours: None,
            max_days_advance: None,
            is_default: true,
        }
    }

    /// Normalized daily cap: `Some(0)` means unlimited, same as `None`.
    pub fn daily_cap(&self) -> Option<u32> {
        self.max_bookings_per_day.filter(|cap| *cap > 0)
    }

    /// Normalized weekly cap: `Some(0)` means unlimited, same as `None`.
    pub fn weekly_cap(&self) -> Option<u32> {
        self.max_bookings_per_week.filter(|cap| *cap > 0)
    }

    pub fn has_buffers(&self) -> bool {
        self.buffer_before_minutes > 0 || self.buffer_after_minutes > 0
    }
}
