//! Google Calendar provider (placeholder adapter).

use async_trait::async_trait;
use bookwise_domain::{BookwiseError, CalendarIntegration, CalendarProviderKind, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CalendarProvider, ProviderEvent};

/// Placeholder Google Calendar adapter. The real implementation calls the
/// Calendar API with the integration's stored credentials; this one only
/// enforces the connection precondition.
#[derive(Default)]
pub struct GoogleCalendarProvider;

impl GoogleCalendarProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Google
    }

    async fn fetch_events(
        &self,
        integration: &CalendarIntegration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<ProviderEvent>> {
        if !integration.is_connected {
            return Err(BookwiseError::Config(format!(
                "Google Calendar integration '{}' has no credentials on file; \
                 please reconnect the calendar",
                integration.id
            )));
        }

        debug!(
            integration = %integration.id,
            window_start = %window_start,
            window_end = %window_end,
            "google calendar fetch (placeholder)"
        );
        Ok(Vec::new())
    }
}
