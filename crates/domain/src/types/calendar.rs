//! External calendar integration and synced event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// Supported external calendar providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProviderKind {
    Google,
    Outlook,
    ICal,
}

impl_status_conversions!(CalendarProviderKind {
    Google => "google",
    Outlook => "outlook",
    ICal => "ical",
});

/// Outcome of the most recent sync run for an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Failed,
}

impl_status_conversions!(SyncOutcome {
    Success => "success",
    Failed => "failed",
});

/// Link between one member and one external calendar account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarIntegration {
    pub id: String,
    pub member_id: String,
    /// Email identifying the external account, used in provider calls
    pub account_email: String,
    pub provider: CalendarProviderKind,
    pub is_active: bool,
    /// Whether provider credentials are on file. Credential lifecycle is
    /// managed elsewhere; sync only needs the yes/no.
    pub is_connected: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub sync_status: Option<SyncOutcome>,
    pub sync_error: Option<String>,
}

/// Per-event sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSyncStatus {
    Synced,
    Pending,
    Failed,
    Orphaned,
}

impl_status_conversions!(EventSyncStatus {
    Synced => "synced",
    Pending => "pending",
    Failed => "failed",
    Orphaned => "orphaned",
});

/// A busy-block synced from an outside calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub id: String,
    pub integration_id: String,
    pub member_id: String,
    /// The provider's own event identifier
    pub provider_event_id: String,
    pub title: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    /// Only blocking events participate in conflict checks
    pub is_blocking: bool,
    pub sync_status: EventSyncStatus,
    /// Hash of the event content, used to detect no-op re-syncs
    pub content_hash: String,
    pub last_synced_at: DateTime<Utc>,
}

impl ExternalEvent {
    /// Whether this event makes the member busy for the given window.
    /// Mirrors the evaluator's filter: blocking, timed (not all-day),
    /// successfully synced, half-open overlap.
    pub fn blocks_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.is_blocking
            && !self.is_all_day
            && self.sync_status == EventSyncStatus::Synced
            && self.start < end
            && self.end > start
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Busy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(start_h: u32, end_h: u32) -> ExternalEvent {
        ExternalEvent {
            id: "e1".into(),
            integration_id: "i1".into(),
            member_id: "alice".into(),
            provider_event_id: "google-1".into(),
            title: None,
            start: Utc.with_ymd_and_hms(2024, 6, 3, start_h, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 3, end_h, 0, 0).unwrap(),
            is_all_day: false,
            is_blocking: true,
            sync_status: EventSyncStatus::Synced,
            content_hash: "abc".into(),
            last_synced_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn all_day_events_never_block() {
        let mut ev = event(10, 11);
        ev.is_all_day = true;
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();
        assert!(!ev.blocks_window(start, end));
    }

    #[test]
    fn unsynced_events_never_block() {
        let mut ev = event(10, 11);
        ev.sync_status = EventSyncStatus::Pending;
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();
        assert!(!ev.blocks_window(start, end));
    }

    #[test]
    fn untitled_events_display_as_busy() {
        assert_eq!(event(10, 11).display_title(), "Busy");
    }
}
