//! Port interfaces for assignment selection

use async_trait::async_trait;
use bookwise_domain::{Department, DepartmentMember, Result};
use chrono::{DateTime, Utc};

/// Department and membership source
#[async_trait]
pub trait DepartmentSource: Send + Sync {
    async fn find_department(&self, department_id: &str) -> Result<Option<Department>>;

    async fn find_department_by_slug(&self, slug: &str) -> Result<Option<Department>>;

    /// Active members of the department with their tracking fields.
    async fn active_members(&self, department_id: &str) -> Result<Vec<DepartmentMember>>;

    /// All members of the department, active or not (statistics views).
    async fn all_members(&self, department_id: &str) -> Result<Vec<DepartmentMember>>;

    /// Whether the member holds an active membership in the department.
    async fn is_active_member(&self, department_id: &str, member_id: &str) -> Result<bool>;

    /// Stamp `last_assigned_at = at` and increment `total_assignments` for
    /// exactly one member row, atomically. Implementations must not rewrite
    /// the whole department aggregate; concurrent assignments to different
    /// members of the same department must both land.
    async fn record_assignment(
        &self,
        department_id: &str,
        member_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
