//! SQLite implementation of the availability rule and date override ports.

use std::sync::Arc;

use async_trait::async_trait;
use bookwise_core::availability::ports::{AvailabilityRuleSource, DateOverrideSource};
use bookwise_domain::{
    AvailabilityRule, BookwiseError, DateOverride, OverrideKind, Result,
};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::instrument;

use crate::errors::InfraError;

use super::codec::{fmt_date, fmt_time, parse_date, parse_time};
use super::manager::SqlitePool;

/// SQLite implementation of `AvailabilityRuleSource` and `DateOverrideSource`
pub struct SqliteAvailabilityRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteAvailabilityRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub fn upsert_rule(&self, rule: &AvailabilityRule) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO availability_rules
                (id, member_id, buffer_before_minutes, buffer_after_minutes,
                 max_bookings_per_day, max_bookings_per_week,
                 min_notice_hours, max_days_advance, is_default)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                buffer_before_minutes = excluded.buffer_before_minutes,
                buffer_after_minutes = excluded.buffer_after_minutes,
                max_bookings_per_day = excluded.max_bookings_per_day,
                max_bookings_per_week = excluded.max_bookings_per_week,
                min_notice_hours = excluded.min_notice_hours,
                max_days_advance = excluded.max_days_advance,
                is_default = excluded.is_default",
            params![
                rule.id,
                rule.member_id,
                rule.buffer_before_minutes,
                rule.buffer_after_minutes,
                rule.max_bookings_per_day,
                rule.max_bookings_per_week,
                rule.min_notice_hours,
                rule.max_days_advance,
                rule.is_default,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    /// Insert an override; at most one may exist per (member, date).
    pub fn insert_override(&self, ov: &DateOverride) -> Result<()> {
        let (available, custom_start, custom_end) = match ov.kind {
            OverrideKind::Unavailable => (false, None, None),
            OverrideKind::CustomHours { start, end } => {
                (true, Some(fmt_time(start)), Some(fmt_time(end)))
            }
        };
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO date_overrides
                (id, member_id, date, available, custom_start, custom_end, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ov.id,
                ov.member_id,
                fmt_date(ov.date),
                available,
                custom_start,
                custom_end,
                ov.reason,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}

#[async_trait]
impl AvailabilityRuleSource for SqliteAvailabilityRepository {
    #[instrument(skip(self))]
    async fn default_rule(&self, member_id: &str) -> Result<Option<AvailabilityRule>> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT id, member_id, buffer_before_minutes, buffer_after_minutes,
                    max_bookings_per_day, max_bookings_per_week,
                    min_notice_hours, max_days_advance, is_default
             FROM availability_rules
             WHERE member_id = ?1 AND is_default = 1
             LIMIT 1",
            params![member_id],
            |row| {
                Ok(AvailabilityRule {
                    id: row.get(0)?,
                    member_id: row.get(1)?,
                    buffer_before_minutes: row.get(2)?,
                    buffer_after_minutes: row.get(3)?,
                    max_bookings_per_day: row.get(4)?,
                    max_bookings_per_week: row.get(5)?,
                    min_notice_hours: row.get(6)?,
                    max_days_advance: row.get(7)?,
                    is_default: row.get(8)?,
                })
            },
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }
}

#[async_trait]
impl DateOverrideSource for SqliteAvailabilityRepository {
    #[instrument(skip(self))]
    async fn override_for_date(
        &self,
        member_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DateOverride>> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT id, member_id, date, available, custom_start, custom_end, reason
                 FROM date_overrides
                 WHERE member_id = ?1 AND date = ?2",
                params![member_id, fmt_date(date)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(InfraError::from)?;

        let Some((id, member_id, date_str, available, custom_start, custom_end, reason)) = row
        else {
            return Ok(None);
        };

        let kind = if !available {
            OverrideKind::Unavailable
        } else {
            match (custom_start, custom_end) {
                (Some(start), Some(end)) => OverrideKind::CustomHours {
                    start: parse_time(&start)?,
                    end: parse_time(&end)?,
                },
                _ => {
                    return Err(BookwiseError::Database(format!(
                        "override '{id}' is available but missing custom hours"
                    )))
                }
            }
        };

        Ok(Some(DateOverride { id, member_id, date: parse_date(&date_str)?, kind, reason }))
    }
}
