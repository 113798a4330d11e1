//! Calendar sync worker
//!
//! Polls each active integration's provider for events inside the sync
//! horizon, then reconciles the local busy-block table: unchanged events are
//! detected by content hash and skipped, changed or new events are upserted,
//! and events the provider no longer returns are swept. Every run records
//! its outcome on the integration row.

use std::collections::HashSet;
use std::sync::Arc;

use bookwise_domain::constants::{SYNC_ERROR_LOG_MAX_CHARS, SYNC_HORIZON_DAYS};
use bookwise_domain::{
    BookwiseError, CalendarIntegration, EventSyncStatus, ExternalEvent, Result, SyncOutcome,
};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::database::SqliteCalendarRepository;

use super::providers::{CalendarProvider, ProviderEvent};

/// Result of syncing one integration
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub integration_id: String,
    pub fetched: usize,
    pub upserted: usize,
    pub unchanged: usize,
    pub swept: usize,
}

/// Calendar sync worker
pub struct CalendarSyncWorker {
    repository: Arc<SqliteCalendarRepository>,
    providers: Vec<Arc<dyn CalendarProvider>>,
    horizon_days: i64,
}

impl CalendarSyncWorker {
    pub fn new(
        repository: Arc<SqliteCalendarRepository>,
        providers: Vec<Arc<dyn CalendarProvider>>,
    ) -> Self {
        Self { repository, providers, horizon_days: SYNC_HORIZON_DAYS }
    }

    pub fn with_horizon_days(mut self, days: i64) -> Self {
        self.horizon_days = days;
        self
    }

    /// Sync every active integration. Failures are isolated per integration
    /// and recorded on its row; the overall call fails only when at least
    /// one integration failed, matching the scheduler's error accounting.
    #[instrument(skip(self))]
    pub async fn sync_all(&self, now: DateTime<Utc>) -> Result<Vec<SyncReport>> {
        let integrations = self.repository.active_integrations()?;
        if integrations.is_empty() {
            info!("no active calendar integrations to sync");
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        let mut failures = 0usize;
        for integration in &integrations {
            match self.sync_integration(integration, now).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    failures += 1;
                    warn!(
                        integration = %integration.id,
                        account = %redact_email(&integration.account_email),
                        error = %err,
                        "calendar integration sync failed"
                    );
                }
            }
        }

        info!(
            total = integrations.len(),
            synced = reports.len(),
            failures,
            "calendar sync batch completed"
        );

        if failures > 0 {
            return Err(BookwiseError::Internal(format!(
                "Calendar sync encountered {failures} errors across {} integrations",
                integrations.len()
            )));
        }
        Ok(reports)
    }

    /// Sync a single integration by id.
    #[instrument(skip(self))]
    pub async fn sync_by_id(&self, integration_id: &str, now: DateTime<Utc>) -> Result<SyncReport> {
        let integration = self
            .repository
            .find_integration(integration_id)?
            .ok_or_else(|| {
                BookwiseError::NotFound(format!("Integration '{integration_id}' not found"))
            })?;
        self.sync_integration(&integration, now).await
    }

    async fn sync_integration(
        &self,
        integration: &CalendarIntegration,
        now: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.kind() == integration.provider)
            .ok_or_else(|| {
                BookwiseError::Config(format!(
                    "No provider registered for '{}'",
                    integration.provider
                ))
            })?;

        let window_end = now + Duration::days(self.horizon_days);
        let fetched = match provider.fetch_events(integration, now, window_end).await {
            Ok(events) => events,
            Err(err) => {
                let mut message = err.to_string();
                message.truncate(SYNC_ERROR_LOG_MAX_CHARS);
                self.repository.mark_sync_outcome(
                    &integration.id,
                    SyncOutcome::Failed,
                    Some(&message),
                    now,
                )?;
                return Err(err);
            }
        };

        let mut upserted = 0;
        let mut unchanged = 0;
        let mut seen = HashSet::with_capacity(fetched.len());
        for event in &fetched {
            seen.insert(event.provider_event_id.clone());

            let hash = event_content_hash(event);
            if self
                .repository
                .event_hash(&integration.id, &event.provider_event_id)?
                .is_some_and(|stored| stored == hash)
            {
                unchanged += 1;
                continue;
            }

            self.repository.upsert_event(&to_external_event(integration, event, hash, now))?;
            upserted += 1;
        }

        let swept = self.repository.sweep_orphans(&integration.id, &seen)?;
        self.repository
            .mark_sync_outcome(&integration.id, SyncOutcome::Success, None, now)?;

        info!(
            integration = %integration.id,
            fetched = fetched.len(),
            upserted,
            unchanged,
            swept,
            "calendar integration synced"
        );

        Ok(SyncReport {
            integration_id: integration.id.clone(),
            fetched: fetched.len(),
            upserted,
            unchanged,
            swept,
        })
    }
}

/// Redact a calendar account email for log output.
fn redact_email(email: &str) -> String {
    const EMAIL_HASH_SALT: &[u8] = b"bookwise-calendar-sync-email-salt";
    let mut hasher = Sha256::new();
    hasher.update(EMAIL_HASH_SALT);
    hasher.update(email.as_bytes());
    let digest = hasher.finalize();
    let hash = hex::encode(&digest[..8]);
    format!("email_hash={hash}")
}

/// Content hash over the fields that matter for conflict checking. A resync
/// returning an identical event is a no-op.
fn event_content_hash(event: &ProviderEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.provider_event_id.as_bytes());
    hasher.update(event.title.as_deref().unwrap_or("").as_bytes());
    hasher.update(event.start.timestamp().to_le_bytes());
    hasher.update(event.end.timestamp().to_le_bytes());
    hasher.update([u8::from(event.is_all_day), u8::from(event.is_busy)]);
    hex::encode(hasher.finalize())
}

fn to_external_event(
    integration: &CalendarIntegration,
    event: &ProviderEvent,
    content_hash: String,
    now: DateTime<Utc>,
) -> ExternalEvent {
    ExternalEvent {
        id: Uuid::new_v4().to_string(),
        integration_id: integration.id.clone(),
        member_id: integration.member_id.clone(),
        provider_event_id: event.provider_event_id.clone(),
        title: event.title.clone(),
        start: event.start,
        end: event.end,
        is_all_day: event.is_all_day,
        is_blocking: event.is_busy,
        sync_status: EventSyncStatus::Synced,
        content_hash,
        last_synced_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bookwise_domain::CalendarProviderKind;
    use chrono::TimeZone;
    use std::sync::Mutex;

    use crate::database::manager::SqlitePool;

    /// Provider returning a scripted event list.
    struct ScriptedProvider {
        events: Mutex<Vec<ProviderEvent>>,
    }

    impl ScriptedProvider {
        fn new(events: Vec<ProviderEvent>) -> Arc<Self> {
            Arc::new(Self { events: Mutex::new(events) })
        }

        fn set_events(&self, events: Vec<ProviderEvent>) {
            *self.events.lock().unwrap() = events;
        }
    }

    #[async_trait]
    impl CalendarProvider for ScriptedProvider {
        fn kind(&self) -> CalendarProviderKind {
            CalendarProviderKind::Google
        }

        async fn fetch_events(
            &self,
            _integration: &CalendarIntegration,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
        ) -> Result<Vec<ProviderEvent>> {
            Ok(self.events.lock().unwrap().clone())
        }
    }

    fn seed_repo() -> Arc<SqliteCalendarRepository> {
        let pool = SqlitePool::open_in_memory().unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO members (id, email, full_name, timezone, is_enabled, created_at)
             VALUES ('alice', 'a@b.c', 'Alice', 'UTC', 1, 0);",
        )
        .unwrap();
        drop(conn);

        let repo = Arc::new(SqliteCalendarRepository::new(pool));
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

    fn provider_event(id: &str, start_h: u32) -> ProviderEvent {
        ProviderEvent {
            provider_event_id: id.into(),
            title: Some("Standup".into()),
            start: Utc.with_ymd_and_hms(2024, 6, 3, start_h, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 3, start_h + 1, 0, 0).unwrap(),
            is_all_day: false,
            is_busy: true,
        }
    }

    #[tokio::test]
    async fn resync_of_unchanged_events_is_a_noop() {
        let repo = seed_repo();
        let provider = ScriptedProvider::new(vec![provider_event("ev-1", 10)]);
        let worker = CalendarSyncWorker::new(repo.clone(), vec![provider.clone() as Arc<dyn CalendarProvider>]);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

        let first = worker.sync_by_id("int-1", now).await.unwrap();
        assert_eq!(first.upserted, 1);
        assert_eq!(first.unchanged, 0);

        let second = worker.sync_by_id("int-1", now).await.unwrap();
        assert_eq!(second.upserted, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[tokio::test]
    async fn changed_events_are_upserted_and_orphans_swept() {
        let repo = seed_repo();
        let provider = ScriptedProvider::new(vec![provider_event("ev-1", 10), provider_event("ev-2", 13)]);
        let worker = CalendarSyncWorker::new(repo.clone(), vec![provider.clone() as Arc<dyn CalendarProvider>]);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

        worker.sync_by_id("int-1", now).await.unwrap();

        // ev-1 moves an hour later; ev-2 disappears from the provider.
        provider.set_events(vec![provider_event("ev-1", 11)]);
        let report = worker.sync_by_id("int-1", now).await.unwrap();

        assert_eq!(report.upserted, 1);
        assert_eq!(report.swept, 1);
        assert!(repo.event_hash("int-1", "ev-2").unwrap().is_none());
    }

    #[tokio::test]
    async fn provider_failure_marks_integration_failed() {
        let repo = seed_repo();
        // Register no matching provider: sync fails before any fetch.
        let worker = CalendarSyncWorker::new(repo.clone(), Vec::new());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

        let err = worker.sync_by_id("int-1", now).await.unwrap_err();
        assert!(matches!(err, BookwiseError::Config(_)));
    }

    #[test]
    fn email_redaction_is_deterministic_and_masking() {
        let first = redact_email("user@example.com");
        let second = redact_email("user@example.com");
        assert_eq!(first, second);
        assert!(first.starts_with("email_hash="));
        assert!(!first.contains("user"));
    }

    #[tokio::test]
    async fn successful_sync_stamps_the_integration() {
        let repo = seed_repo();
        let provider = ScriptedProvider::new(vec![]);
        let worker = CalendarSyncWorker::new(repo.clone(), vec![provider as Arc<dyn CalendarProvider>]);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

        worker.sync_by_id("int-1", now).await.unwrap();

        let integration = repo.find_integration("int-1").unwrap().unwrap();
        assert_eq!(integration.sync_status, Some(SyncOutcome::Success));
        assert_eq!(integration.last_sync, Some(now));
        assert!(integration.sync_error.is_none());
    }
}
