//! Outlook Calendar provider (placeholder adapter).

use async_trait::async_trait;
use bookwise_domain::{BookwiseError, CalendarIntegration, CalendarProviderKind, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CalendarProvider, ProviderEvent};

/// Placeholder Outlook adapter mirroring the Graph API calendarView call.
#[derive(Default)]
pub struct OutlookCalendarProvider;

impl OutlookCalendarProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CalendarProvider for OutlookCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Outlook
    }

    async fn fetch_events(
        &self,
        integration: &CalendarIntegration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<ProviderEvent>> {
        if !integration.is_connected {
            return Err(BookwiseError::Config(format!(
                "Outlook Calendar integration '{}' has no credentials on file; \
                 please reconnect the calendar",
                integration.id
            )));
        }

        debug!(
            integration = %integration.id,
            window_start = %window_start,
            window_end = %window_end,
            "outlook calendar fetch (placeholder)"
        );
        Ok(Vec::new())
    }
}
