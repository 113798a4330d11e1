//! iCal subscription provider (placeholder adapter).

use async_trait::async_trait;
use bookwise_domain::{BookwiseError, CalendarIntegration, CalendarProviderKind, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CalendarProvider, ProviderEvent};

/// Placeholder iCal adapter. The real implementation downloads and parses
/// the subscribed .ics feed; subscriptions need no OAuth, only a URL, which
/// is what `is_connected` models here.
#[derive(Default)]
pub struct ICalProvider;

impl ICalProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CalendarProvider for ICalProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::ICal
    }

    async fn fetch_events(
        &self,
        integration: &CalendarIntegration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<ProviderEvent>> {
        if !integration.is_connected {
            return Err(BookwiseError::Config(format!(
                "iCal integration '{}' has no subscription URL on file",
                integration.id
            )));
        }

        debug!(
            integration = %integration.id,
            window_start = %window_start,
            window_end = %window_end,
            "ical fetch (placeholder)"
        );
        Ok(Vec::new())
    }
}
