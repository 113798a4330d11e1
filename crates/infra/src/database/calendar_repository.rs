//! SQLite implementation of the calendar events port plus the sync-side
//! write operations used by the calendar sync worker.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bookwise_core::availability::ports::CalendarEventsSource;
use bookwise_domain::{
    CalendarIntegration, CalendarProviderKind, EventSyncStatus, ExternalEvent, Result,
    SyncOutcome,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, instrument};

use crate::errors::InfraError;

use super::codec::{opt_ts_to_datetime, parse_enum, ts_to_datetime};
use super::manager::SqlitePool;

/// SQLite implementation of `CalendarEventsSource` and sync persistence
pub struct SqliteCalendarRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteCalendarRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub fn upsert_integration(&self, integration: &CalendarIntegration) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO calendar_integrations
                (id, member_id, account_email, provider, is_active, is_connected,
                 last_sync, sync_status, sync_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                account_email = excluded.account_email,
                provider = excluded.provider,
                is_active = excluded.is_active,
                is_connected = excluded.is_connected",
            params![
                integration.id,
                integration.member_id,
                integration.account_email,
                integration.provider.to_string(),
                integration.is_active,
                integration.is_connected,
                integration.last_sync.map(|t| t.timestamp()),
                integration.sync_status.map(|s| s.to_string()),
                integration.sync_error,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    pub fn active_integrations(&self) -> Result<Vec<CalendarIntegration>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, member_id, account_email, provider, is_active, is_connected,
                        last_sync, sync_status, sync_error
                 FROM calendar_integrations WHERE is_active = 1 ORDER BY id",
            )
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map([], Self::map_integration_row)
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;
        rows.into_iter().map(Self::hydrate_integration).collect()
    }

    pub fn find_integration(&self, integration_id: &str) -> Result<Option<CalendarIntegration>> {
        let conn = self.pool.get()?;
        let raw = conn
            .query_row(
                "SELECT id, member_id, account_email, provider, is_active, is_connected,
                        last_sync, sync_status, sync_error
                 FROM calendar_integrations WHERE id = ?1",
                params![integration_id],
                Self::map_integration_row,
            )
            .optional()
            .map_err(InfraError::from)?;
        raw.map(Self::hydrate_integration).transpose()
    }

    /// Record the outcome of a sync run on the integration row.
    pub fn mark_sync_outcome(
        &self,
        integration_id: &str,
        outcome: SyncOutcome,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE calendar_integrations
             SET last_sync = ?2, sync_status = ?3, sync_error = ?4
             WHERE id = ?1",
            params![integration_id, at.timestamp(), outcome.to_string(), error],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    /// Stored content hash for one provider event, if the event is known.
    pub fn event_hash(
        &self,
        integration_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<String>> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT content_hash FROM calendar_events
             WHERE integration_id = ?1 AND provider_event_id = ?2",
            params![integration_id, provider_event_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }

    /// Insert or refresh a synced event.
    pub fn upsert_event(&self, event: &ExternalEvent) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO calendar_events
                (id, integration_id, member_id, provider_event_id, title, start_ts, end_ts,
                 is_all_day, is_blocking, sync_status, content_hash, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(integration_id, provider_event_id) DO UPDATE SET
                title = excluded.title,
                start_ts = excluded.start_ts,
                end_ts = excluded.end_ts,
                is_all_day = excluded.is_all_day,
                is_blocking = excluded.is_blocking,
                sync_status = excluded.sync_status,
                content_hash = excluded.content_hash,
                last_synced_at = excluded.last_synced_at",
            params![
                event.id,
                event.integration_id,
                event.member_id,
                event.provider_event_id,
                event.title,
                event.start.timestamp(),
                event.end.timestamp(),
                event.is_all_day,
                event.is_blocking,
                event.sync_status.to_string(),
                event.content_hash,
                event.last_synced_at.timestamp(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    /// Delete events of an integration that the provider no longer returns.
    /// Returns the number of rows swept.
    pub fn sweep_orphans(
        &self,
        integration_id: &str,
        seen_provider_ids: &HashSet<String>,
    ) -> Result<usize> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT provider_event_id FROM calendar_events WHERE integration_id = ?1",
            )
            .map_err(InfraError::from)?;
        let known = stmt
            .query_map(params![integration_id], |row| row.get::<_, String>(0))
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;

        let mut swept = 0;
        for provider_id in known {
            if !seen_provider_ids.contains(&provider_id) {
                swept += conn
                    .execute(
                        "DELETE FROM calendar_events
                         WHERE integration_id = ?1 AND provider_event_id = ?2",
                        params![integration_id, provider_id],
                    )
                    .map_err(InfraError::from)?;
            }
        }
        if swept > 0 {
            debug!(integration = %integration_id, swept, "orphaned calendar events removed");
        }
        Ok(swept)
    }

    fn map_integration_row(row: &Row<'_>) -> rusqlite::Result<IntegrationRow> {
        Ok(IntegrationRow {
            id: row.get(0)?,
            member_id: row.get(1)?,
            account_email: row.get(2)?,
            provider: row.get(3)?,
            is_active: row.get(4)?,
            is_connected: row.get(5)?,
            last_sync: row.get(6)?,
            sync_status: row.get(7)?,
            sync_error: row.get(8)?,
        })
    }

    fn hydrate_integration(row: IntegrationRow) -> Result<CalendarIntegration> {
        Ok(CalendarIntegration {
            id: row.id,
            member_id: row.member_id,
            account_email: row.account_email,
            provider: parse_enum::<CalendarProviderKind>(&row.provider)?,
            is_active: row.is_active,
            is_connected: row.is_connected,
            last_sync: opt_ts_to_datetime(row.last_sync)?,
            sync_status: row
                .sync_status
                .as_deref()
                .map(parse_enum::<SyncOutcome>)
                .transpose()?,
            sync_error: row.sync_error,
        })
    }
}

struct IntegrationRow {
    id: String,
    member_id: String,
    account_email: String,
    provider: String,
    is_active: bool,
    is_connected: bool,
    last_sync: Option<i64>,
    sync_status: Option<String>,
    sync_error: Option<String>,
}

#[async_trait]
impl CalendarEventsSource for SqliteCalendarRepository {
    #[instrument(skip(self))]
    async fn blocking_events(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, integration_id, member_id, provider_event_id, title, start_ts,
                        end_ts, is_all_day, is_blocking, sync_status, content_hash,
                        last_synced_at
                 FROM calendar_events
                 WHERE member_id = ?1
                   AND is_blocking = 1
                   AND is_all_day = 0
                   AND sync_status = 'synced'
                   AND start_ts < ?2
                   AND end_ts > ?3
                 ORDER BY start_ts",
            )
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![member_id, end.timestamp(), start.timestamp()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, bool>(7)?,
                    row.get::<_, bool>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, i64>(11)?,
                ))
            })
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;

        rows.into_iter()
            .map(
                |(
                    id,
                    integration_id,
                    member_id,
                    provider_event_id,
                    title,
                    start_ts,
                    end_ts,
                    is_all_day,
                    is_blocking,
                    sync_status,
                    content_hash,
                    last_synced_ts,
                )| {
                    Ok(ExternalEvent {
                        id,
                        integration_id,
                        member_id,
                        provider_event_id,
                        title,
                        start: ts_to_datetime(start_ts)?,
                        end: ts_to_datetime(end_ts)?,
                        is_all_day,
                        is_blocking,
                        sync_status: parse_enum::<EventSyncStatus>(&sync_status)?,
                        content_hash,
                        last_synced_at: ts_to_datetime(last_synced_ts)?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seed(pool: &Arc<SqlitePool>) -> SqliteCalendarRepository {
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO members (id, email, full_name, timezone, is_enabled, created_at)
             VALUES ('alice', 'a@b.c', 'Alice', 'UTC', 1, 0);",
        )
        .unwrap();
        drop(conn);

        let repo = SqliteCalendarRepository::new(pool.clone());
        repo.upsert_integration(&CalendarIntegration {
            id: "int-1".into(),
            member_id: "alice".into(),
            account_email: "alice@example.com".into(),
            provider: CalendarProviderKind::Google,
            is_active: true,
            is_connected: true,
            last_sync: None,
            sync_status: None,
            sync_error: None,
        })
        .unwrap();
        repo
    }

    fn sample_event(id: &str, start_h: u32, end_h: u32) -> ExternalEvent {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, start_h, 0, 0).unwrap();
        ExternalEvent {
            id: id.into(),
            integration_id: "int-1".into(),
            member_id: "alice".into(),
            provider_event_id: format!("prov-{id}"),
            title: Some("Busy block".into()),
            start,
            end: Utc.with_ymd_and_hms(2024, 6, 3, end_h, 0, 0).unwrap(),
            is_all_day: false,
            is_blocking: true,
            sync_status: EventSyncStatus::Synced,
            content_hash: "h1".into(),
            last_synced_at: start,
        }
    }

    #[tokio::test]
    async fn blocking_events_filter_applies() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);

        repo.upsert_event(&sample_event("e1", 10, 11)).unwrap();
        let mut all_day = sample_event("e2", 0, 23);
        all_day.is_all_day = true;
        repo.upsert_event(&all_day).unwrap();
        let mut pending = sample_event("e3", 10, 11);
        pending.sync_status = EventSyncStatus::Pending;
        repo.upsert_event(&pending).unwrap();

        let window_start = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let window_end = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();
        let events = repo.blocking_events("alice", window_start, window_end).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e1");
    }

    #[tokio::test]
    async fn content_hash_survives_upsert() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);

        let event = sample_event("e1", 10, 11);
        repo.upsert_event(&event).unwrap();
        assert_eq!(repo.event_hash("int-1", "prov-e1").unwrap().as_deref(), Some("h1"));

        let mut changed = event;
        changed.content_hash = "h2".into();
        repo.upsert_event(&changed).unwrap();
        assert_eq!(repo.event_hash("int-1", "prov-e1").unwrap().as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn orphan_sweep_removes_unseen_events() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);
        repo.upsert_event(&sample_event("e1", 10, 11)).unwrap();
        repo.upsert_event(&sample_event("e2", 12, 13)).unwrap();

        let seen: HashSet<String> = ["prov-e1".to_string()].into_iter().collect();
        let swept = repo.sweep_orphans("int-1", &seen).unwrap();

        assert_eq!(swept, 1);
        assert!(repo.event_hash("int-1", "prov-e2").unwrap().is_none());
        assert!(repo.event_hash("int-1", "prov-e1").unwrap().is_some());
    }
}
