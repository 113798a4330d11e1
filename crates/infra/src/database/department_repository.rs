//! SQLite implementation of the department and meeting type ports.
//!
//! Assignment tracking is updated with a single-row atomic UPDATE rather
//! than a load-mutate-save of the whole department aggregate, so concurrent
//! assignments to different members of one department cannot lose updates.

use std::sync::Arc;

use async_trait::async_trait;
use bookwise_core::assignment::ports::DepartmentSource;
use bookwise_core::slots::ports::MeetingTypeSource;
use bookwise_domain::{
    BookwiseError, Department, DepartmentMember, LocationType, MeetingType, Result,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;

use crate::errors::InfraError;

use super::codec::{opt_ts_to_datetime, parse_enum};
use super::manager::SqlitePool;

/// SQLite implementation of `DepartmentSource` and `MeetingTypeSource`
pub struct SqliteDepartmentRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteDepartmentRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub fn upsert_department(&self, department: &Department) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO departments (id, name, slug, timezone, assignment_algorithm, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                timezone = excluded.timezone,
                assignment_algorithm = excluded.assignment_algorithm,
                is_active = excluded.is_active",
            params![
                department.id,
                department.name,
                department.slug,
                department.timezone,
                department.assignment_algorithm,
                department.is_active,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    pub fn upsert_membership(&self, member: &DepartmentMember) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO department_members
                (department_id, member_id, is_active, assignment_priority,
                 last_assigned_at, total_assignments)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(department_id, member_id) DO UPDATE SET
                is_active = excluded.is_active,
                assignment_priority = excluded.assignment_priority",
            params![
                member.department_id,
                member.member_id,
                member.is_active,
                i64::from(member.assignment_priority),
                member.last_assigned_at.map(|t| t.timestamp()),
                member.total_assignments as i64,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    pub fn upsert_meeting_type(&self, meeting_type: &MeetingType) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO meeting_types
                (id, department_id, name, slug, duration_minutes, is_public, is_internal,
                 is_active, requires_approval, location_type, custom_location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                duration_minutes = excluded.duration_minutes,
                is_public = excluded.is_public,
                is_internal = excluded.is_internal,
                is_active = excluded.is_active,
                requires_approval = excluded.requires_approval,
                location_type = excluded.location_type,
                custom_location = excluded.custom_location",
            params![
                meeting_type.id,
                meeting_type.department_id,
                meeting_type.name,
                meeting_type.slug,
                meeting_type.duration_minutes,
                meeting_type.is_public,
                meeting_type.is_internal,
                meeting_type.is_active,
                meeting_type.requires_approval,
                meeting_type.location_type.map(|l| l.to_string()),
                meeting_type.custom_location,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    fn map_department(row: &Row<'_>) -> rusqlite::Result<Department> {
        Ok(Department {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            timezone: row.get(3)?,
            assignment_algorithm: row.get(4)?,
            is_active: row.get(5)?,
        })
    }

    fn map_meeting_type(row: &Row<'_>) -> rusqlite::Result<(MeetingType, Option<String>)> {
        let location: Option<String> = row.get(9)?;
        Ok((
            MeetingType {
                id: row.get(0)?,
                department_id: row.get(1)?,
                name: row.get(2)?,
                slug: row.get(3)?,
                duration_minutes: row.get(4)?,
                is_public: row.get(5)?,
                is_internal: row.get(6)?,
                is_active: row.get(7)?,
                requires_approval: row.get(8)?,
                location_type: None,
                custom_location: row.get(10)?,
            },
            location,
        ))
    }

    fn hydrate_meeting_type(raw: (MeetingType, Option<String>)) -> Result<MeetingType> {
        let (mut meeting_type, location) = raw;
        meeting_type.location_type = location
            .as_deref()
            .map(parse_enum::<LocationType>)
            .transpose()?;
        Ok(meeting_type)
    }

    fn members_where(
        conn: &Connection,
        department_id: &str,
        only_active: bool,
    ) -> Result<Vec<DepartmentMember>> {
        let sql = format!(
            "SELECT department_id, member_id, is_active, assignment_priority,
                    last_assigned_at, total_assignments
             FROM department_members
             WHERE department_id = ?1{}
             ORDER BY member_id",
            if only_active { " AND is_active = 1" } else { "" }
        );
        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![department_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;

        rows.into_iter()
            .map(
                |(department_id, member_id, is_active, priority, last_ts, total)| {
                    Ok(DepartmentMember {
                        department_id,
                        member_id,
                        is_active,
                        assignment_priority: u8::try_from(priority).unwrap_or(1),
                        last_assigned_at: opt_ts_to_datetime(last_ts)?,
                        total_assignments: u64::try_from(total).unwrap_or(0),
                    })
                },
            )
            .collect()
    }

    fn find_department_where(&self, column: &str, value: &str) -> Result<Option<Department>> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!(
                "SELECT id, name, slug, timezone, assignment_algorithm, is_active
                 FROM departments WHERE {column} = ?1"
            ),
            params![value],
            Self::map_department,
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }
}

#[async_trait]
impl DepartmentSource for SqliteDepartmentRepository {
    async fn find_department(&self, department_id: &str) -> Result<Option<Department>> {
        self.find_department_where("id", department_id)
    }

    async fn find_department_by_slug(&self, slug: &str) -> Result<Option<Department>> {
        self.find_department_where("slug", slug)
    }

    async fn active_members(&self, department_id: &str) -> Result<Vec<DepartmentMember>> {
        let conn = self.pool.get()?;
        Self::members_where(&conn, department_id, true)
    }

    async fn all_members(&self, department_id: &str) -> Result<Vec<DepartmentMember>> {
        let conn = self.pool.get()?;
        Self::members_where(&conn, department_id, false)
    }

    async fn is_active_member(&self, department_id: &str, member_id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM department_members
                 WHERE department_id = ?1 AND member_id = ?2 AND is_active = 1",
                params![department_id, member_id],
                |row| row.get(0),
            )
            .map_err(InfraError::from)?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn record_assignment(
        &self,
        department_id: &str,
        member_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.pool.get()?;
        let updated = conn
            .execute(
                "UPDATE department_members
                 SET last_assigned_at = ?3,
                     total_assignments = total_assignments + 1
                 WHERE department_id = ?1 AND member_id = ?2",
                params![department_id, member_id, at.timestamp()],
            )
            .map_err(InfraError::from)?;

        if updated == 0 {
            return Err(BookwiseError::NotFound(format!(
                "No membership for '{member_id}' in department '{department_id}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingTypeSource for SqliteDepartmentRepository {
    async fn find_meeting_type(&self, meeting_type_id: &str) -> Result<Option<MeetingType>> {
        let conn = self.pool.get()?;
        let raw = conn
            .query_row(
                "SELECT id, department_id, name, slug, duration_minutes, is_public, is_internal,
                        is_active, requires_approval, location_type, custom_location
                 FROM meeting_types WHERE id = ?1",
                params![meeting_type_id],
                Self::map_meeting_type,
            )
            .optional()
            .map_err(InfraError::from)?;
        raw.map(Self::hydrate_meeting_type).transpose()
    }

    async fn find_by_slug(&self, department_id: &str, slug: &str) -> Result<Option<MeetingType>> {
        let conn = self.pool.get()?;
        let raw = conn
            .query_row(
                "SELECT id, department_id, name, slug, duration_minutes, is_public, is_internal,
                        is_active, requires_approval, location_type, custom_location
                 FROM meeting_types WHERE department_id = ?1 AND slug = ?2",
                params![department_id, slug],
                Self::map_meeting_type,
            )
            .optional()
            .map_err(InfraError::from)?;
        raw.map(Self::hydrate_meeting_type).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seed(pool: &Arc<SqlitePool>) -> SqliteDepartmentRepository {
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO members (id, email, full_name, timezone, is_enabled, created_at)
             VALUES ('alice', 'a@b.c', 'Alice', 'UTC', 1, 0),
                    ('bob', 'b@b.c', 'Bob', 'UTC', 1, 0);",
        )
        .unwrap();
        drop(conn);

        let repo = SqliteDepartmentRepository::new(pool.clone());
        repo.upsert_department(&Department {
            id: "sales".into(),
            name: "Sales".into(),
            slug: "sales".into(),
            timezone: "UTC".into(),
            assignment_algorithm: Some("round_robin".into()),
            is_active: true,
        })
        .unwrap();
        for member_id in ["alice", "bob"] {
            repo.upsert_membership(&DepartmentMember {
                department_id: "sales".into(),
                member_id: member_id.into(),
                is_active: true,
                assignment_priority: 5,
                last_assigned_at: None,
                total_assignments: 0,
            })
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn department_lookup_by_id_and_slug() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);

        assert!(repo.find_department("sales").await.unwrap().is_some());
        assert!(repo.find_department_by_slug("sales").await.unwrap().is_some());
        assert!(repo.find_department_by_slug("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_assignment_touches_exactly_one_row() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        repo.record_assignment("sales", "alice", at).await.unwrap();

        let members = repo.active_members("sales").await.unwrap();
        let alice = members.iter().find(|m| m.member_id == "alice").unwrap();
        let bob = members.iter().find(|m| m.member_id == "bob").unwrap();
        assert_eq!(alice.total_assignments, 1);
        assert_eq!(alice.last_assigned_at, Some(at));
        assert_eq!(bob.total_assignments, 0, "other rows must be untouched");
        assert_eq!(bob.last_assigned_at, None);
    }

    #[tokio::test]
    async fn record_assignment_for_unknown_membership_fails() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let err = repo.record_assignment("sales", "ghost", at).await.unwrap_err();
        assert!(matches!(err, BookwiseError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_assignments_to_different_members_both_land() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = Arc::new(seed(&pool));
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let a = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.record_assignment("sales", "alice", at).await })
        };
        let b = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.record_assignment("sales", "bob", at).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let members = repo.active_members("sales").await.unwrap();
        assert!(members.iter().all(|m| m.total_assignments == 1));
    }

    #[tokio::test]
    async fn meeting_type_lookup_by_slug() {
        let pool = SqlitePool::open_in_memory().unwrap();
        let repo = seed(&pool);
        repo.upsert_meeting_type(&MeetingType {
            id: "intro".into(),
            department_id: "sales".into(),
            name: "Intro".into(),
            slug: "intro".into(),
            duration_minutes: 30,
            is_public: true,
            is_internal: false,
            is_active: true,
            requires_approval: false,
            location_type: Some(LocationType::VideoCall),
            custom_location: None,
        })
        .unwrap();

        let found = repo.find_by_slug("sales", "intro").await.unwrap().unwrap();
        assert_eq!(found.duration_minutes, 30);
        assert_eq!(found.location_type, Some(LocationType::VideoCall));
    }
}
