//! Calendar provider adapters
//!
//! Each provider turns one integration's external account into a list of
//! busy-blocks for a time window. The concrete adapters here are placeholder
//! implementations: credential exchange and the actual API calls live
//! outside this system, so a connected integration yields an empty event
//! list and a disconnected one fails the way the real adapter would.

mod google;
mod ical;
mod outlook;

use async_trait::async_trait;
use bookwise_domain::{CalendarIntegration, CalendarProviderKind, Result};
use chrono::{DateTime, Utc};

pub use google::GoogleCalendarProvider;
pub use ical::ICalProvider;
pub use outlook::OutlookCalendarProvider;

/// An event as returned by a provider, before it is persisted locally.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub provider_event_id: String,
    pub title: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    /// Whether the external calendar marks the slot as busy
    pub is_busy: bool,
}

/// One external calendar backend
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn kind(&self) -> CalendarProviderKind;

    /// Fetch events for the integration's account within the window.
    async fn fetch_events(
        &self,
        integration: &CalendarIntegration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<ProviderEvent>>;
}
