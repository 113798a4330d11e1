//! Port interfaces for slot enumeration

use async_trait::async_trait;
use bookwise_domain::{MeetingType, Result};

/// Meeting type lookup
#[async_trait]
pub trait MeetingTypeSource: Send + Sync {
    async fn find_meeting_type(&self, meeting_type_id: &str) -> Result<Option<MeetingType>>;

    /// Look up a meeting type by slug within a department.
    async fn find_by_slug(
        &self,
        department_id: &str,
        slug: &str,
    ) -> Result<Option<MeetingType>>;
}
