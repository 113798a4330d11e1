//! SQLite implementation of the member directory and working hours ports.

use std::sync::Arc;

use async_trait::async_trait;
use bookwise_core::availability::ports::{MemberDirectory, WorkingHoursSource};
use bookwise_domain::{DaySchedule, Member, Result, WorkingHours};
use rusqlite::{params, OptionalExtension};
use tracing::instrument;

use crate::errors::InfraError;

use super::codec::{fmt_time, parse_time, ts_to_datetime};
use super::manager::SqlitePool;

/// SQLite implementation of `MemberDirectory` and `WorkingHoursSource`
pub struct SqliteMemberRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteMemberRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Insert or replace a member record.
    pub fn upsert_member(&self, member: &Member) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO members (id, email, full_name, timezone, is_enabled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                full_name = excluded.full_name,
                timezone = excluded.timezone,
                is_enabled = excluded.is_enabled",
            params![
                member.id,
                member.email,
                member.full_name,
                member.timezone,
                member.is_enabled,
                member.created_at.timestamp(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    /// Replace a member's weekly schedule, all seven days in one transaction.
    pub fn set_working_hours(&self, member_id: &str, hours: &WorkingHours) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction().map_err(InfraError::from)?;
        tx.execute("DELETE FROM working_hours WHERE member_id = ?1", params![member_id])
            .map_err(InfraError::from)?;
        for (weekday, day) in hours.days().iter().enumerate() {
            tx.execute(
                "INSERT INTO working_hours (member_id, weekday, enabled, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    member_id,
                    weekday as i64,
                    day.enabled,
                    fmt_time(day.start),
                    fmt_time(day.end),
                ],
            )
            .map_err(InfraError::from)?;
        }
        tx.commit().map_err(InfraError::from)?;
        Ok(())
    }
}

#[async_trait]
impl MemberDirectory for SqliteMemberRepository {
    #[instrument(skip(self))]
    async fn find_member(&self, member_id: &str) -> Result<Option<Member>> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT id, email, full_name, timezone, is_enabled, created_at
                 FROM members WHERE id = ?1",
                params![member_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(InfraError::from)?;

        match row {
            Some((id, email, full_name, timezone, is_enabled, created_ts)) => Ok(Some(Member {
                id,
                email,
                full_name,
                timezone,
                is_enabled,
                created_at: ts_to_datetime(created_ts)?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WorkingHoursSource for SqliteMemberRepository {
    #[instrument(skip(self))]
    async fn working_hours(&self, member_id: &str) -> Result<Option<WorkingHours>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT weekday, enabled, start_time, end_time
                 FROM working_hours WHERE member_id = ?1 ORDER BY weekday",
            )
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![member_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut days = [DaySchedule::off(); 7];
        for (weekday, enabled, start, end) in rows {
            let index = usize::try_from(weekday).unwrap_or(0).min(6);
            days[index] = DaySchedule {
                enabled,
                start: parse_time(&start)?,
                end: parse_time(&end)?,
            };
        }

        Ok(Some(WorkingHours::new(days)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwise_domain::WorkingHours;
    use chrono::{TimeZone, Utc};

    fn sample_member(id: &str) -> Member {
        Member {
            id: id.into(),
            email: format!("{id}@example.com"),
            full_name: id.into(),
            timezone: "UTC".into(),
            is_enabled: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn member_round_trip() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = SqliteMemberRepository::new(pool);
        repo.upsert_member(&sample_member("alice")).unwrap();

        let found = repo.find_member("alice").await.unwrap().unwrap();
        assert_eq!(found.email, "alice@example.com");
        assert!(repo.find_member("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn working_hours_round_trip() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = SqliteMemberRepository::new(pool);
        repo.upsert_member(&sample_member("alice")).unwrap();

        assert!(repo.working_hours("alice").await.unwrap().is_none());

        let hours = WorkingHours::standard_business();
        repo.set_working_hours("alice", &hours).unwrap();

        let loaded = repo.working_hours("alice").await.unwrap().unwrap();
        assert_eq!(loaded, hours);
    }
}
