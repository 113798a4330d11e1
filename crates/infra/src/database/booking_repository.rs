//! SQLite implementation of the bookings source and booking store.
//!
//! The store is where the evaluate-then-commit race is closed: inserts and
//! reschedules run inside an IMMEDIATE transaction that re-checks for an
//! overlapping non-terminal booking per assigned member before writing.
//! Losing the race surfaces the retryable `BookingConflict` error, distinct
//! from the evaluator's policy conflicts.

use std::sync::Arc;

use async_trait::async_trait;
use bookwise_core::availability::ports::BookingsSource;
use bookwise_core::booking::ports::BookingStore;
use bookwise_domain::{
    AssignedMember, AssignmentHistoryEntry, Booking, BookingHistoryEntry, BookingStatus,
    BookwiseError, Customer, Result,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, instrument};

use crate::errors::InfraError;

use super::codec::{opt_ts_to_datetime, parse_enum, status_list, ts_to_datetime};
use super::manager::SqlitePool;

const BOOKING_COLUMNS: &str = "id, department_id, meeting_type_id, title, start_ts, end_ts, \
     status, customer_name, customer_email, customer_phone, is_internal, booking_reference, \
     cancel_token, reschedule_token, cancellation_reason, cancelled_at, created_by, created_at";

/// SQLite implementation of `BookingsSource` and `BookingStore`
pub struct SqliteBookingRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteBookingRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    fn load_assigned(conn: &Connection, booking_id: &str) -> Result<Vec<AssignedMember>> {
        let mut stmt = conn
            .prepare(
                "SELECT member_id, is_primary_host, assigned_by, assigned_at
                 FROM booking_members WHERE booking_id = ?1 ORDER BY member_id",
            )
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![booking_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;

        rows.into_iter()
            .map(|(member_id, is_primary_host, assigned_by, assigned_ts)| {
                Ok(AssignedMember {
                    member_id,
                    is_primary_host,
                    assigned_by,
                    assigned_at: ts_to_datetime(assigned_ts)?,
                })
            })
            .collect()
    }

    fn map_booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookingRow> {
        Ok(BookingRow {
            id: row.get(0)?,
            department_id: row.get(1)?,
            meeting_type_id: row.get(2)?,
            title: row.get(3)?,
            start_ts: row.get(4)?,
            end_ts: row.get(5)?,
            status: row.get(6)?,
            customer_name: row.get(7)?,
            customer_email: row.get(8)?,
            customer_phone: row.get(9)?,
            is_internal: row.get(10)?,
            booking_reference: row.get(11)?,
            cancel_token: row.get(12)?,
            reschedule_token: row.get(13)?,
            cancellation_reason: row.get(14)?,
            cancelled_at: row.get(15)?,
            created_by: row.get(16)?,
            created_at: row.get(17)?,
        })
    }

    fn hydrate(conn: &Connection, row: BookingRow) -> Result<Booking> {
        let assigned = Self::load_assigned(conn, &row.id)?;
        let customer = match (row.customer_name, row.customer_email) {
            (Some(name), Some(email)) => {
                Some(Customer { name, email, phone: row.customer_phone })
            }
            _ => None,
        };

        Ok(Booking {
            id: row.id,
            department_id: row.department_id,
            meeting_type_id: row.meeting_type_id,
            title: row.title,
            start: ts_to_datetime(row.start_ts)?,
            end: ts_to_datetime(row.end_ts)?,
            status: parse_enum::<BookingStatus>(&row.status)?,
            assigned,
            customer,
            is_internal: row.is_internal,
            booking_reference: row.booking_reference,
            cancel_token: row.cancel_token,
            reschedule_token: row.reschedule_token,
            cancellation_reason: row.cancellation_reason,
            cancelled_at: opt_ts_to_datetime(row.cancelled_at)?,
            created_by: row.created_by,
            created_at: ts_to_datetime(row.created_at)?,
        })
    }

    fn find_by_column(&self, column: &str, value: &str) -> Result<Option<Booking>> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = ?1"),
                params![value],
                Self::map_booking_row,
            )
            .optional()
            .map_err(InfraError::from)?;

        row.map(|r| Self::hydrate(&conn, r)).transpose()
    }

    /// The commit-time guard: count non-terminal overlaps for one member
    /// inside the open transaction.
    fn overlap_exists(
        tx: &Transaction<'_>,
        member_id: &str,
        start_ts: i64,
        end_ts: i64,
        exclude: Option<&str>,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM bookings b
             INNER JOIN booking_members bm ON bm.booking_id = b.id
             WHERE bm.member_id = ?1
               AND b.status IN ({})
               AND b.start_ts < ?2
               AND b.end_ts > ?3
               AND (?4 IS NULL OR b.id != ?4)",
            status_list(BookingStatus::blocking_statuses())
        );
        let count: i64 = tx
            .query_row(&sql, params![member_id, end_ts, start_ts, exclude], |row| row.get(0))
            .map_err(InfraError::from)?;
        Ok(count > 0)
    }

    fn write_booking_row(tx: &Transaction<'_>, booking: &Booking, replace: bool) -> Result<()> {
        if replace {
            tx.execute(
                "UPDATE bookings SET
                    title = ?2, start_ts = ?3, end_ts = ?4, status = ?5,
                    customer_name = ?6, customer_email = ?7, customer_phone = ?8,
                    cancellation_reason = ?9, cancelled_at = ?10
                 WHERE id = ?1",
                params![
                    booking.id,
                    booking.title,
                    booking.start.timestamp(),
                    booking.end.timestamp(),
                    booking.status.to_string(),
                    booking.customer.as_ref().map(|c| c.name.clone()),
                    booking.customer.as_ref().map(|c| c.email.clone()),
                    booking.customer.as_ref().and_then(|c| c.phone.clone()),
                    booking.cancellation_reason,
                    booking.cancelled_at.map(|t| t.timestamp()),
                ],
            )
            .map_err(InfraError::from)?;
            tx.execute("DELETE FROM booking_members WHERE booking_id = ?1", params![booking.id])
                .map_err(InfraError::from)?;
        } else {
            tx.execute(
                &format!(
                    "INSERT INTO bookings ({BOOKING_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                     ?16, ?17, ?18)"
                ),
                params![
                    booking.id,
                    booking.department_id,
                    booking.meeting_type_id,
                    booking.title,
                    booking.start.timestamp(),
                    booking.end.timestamp(),
                    booking.status.to_string(),
                    booking.customer.as_ref().map(|c| c.name.clone()),
                    booking.customer.as_ref().map(|c| c.email.clone()),
                    booking.customer.as_ref().and_then(|c| c.phone.clone()),
                    booking.is_internal,
                    booking.booking_reference,
                    booking.cancel_token,
                    booking.reschedule_token,
                    booking.cancellation_reason,
                    booking.cancelled_at.map(|t| t.timestamp()),
                    booking.created_by,
                    booking.created_at.timestamp(),
                ],
            )
            .map_err(InfraError::from)?;
        }

        for assigned in &booking.assigned {
            tx.execute(
                "INSERT INTO booking_members
                    (booking_id, member_id, is_primary_host, assigned_by, assigned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    booking.id,
                    assigned.member_id,
                    assigned.is_primary_host,
                    assigned.assigned_by,
                    assigned.assigned_at.timestamp(),
                ],
            )
            .map_err(InfraError::from)?;
        }

        Ok(())
    }

    fn guarded_write(&self, booking: &Booking, replace: bool) -> Result<()> {
        if booking.end <= booking.start {
            return Err(BookwiseError::InvalidInput(
                "Booking end must be after its start".into(),
            ));
        }

        let mut conn = self.pool.get()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(InfraError::from)?;

        // Only bookings that still reserve their slot contend for it.
        if booking.status.blocks_availability() {
            let exclude = replace.then_some(booking.id.as_str());
            for assigned in &booking.assigned {
                if Self::overlap_exists(
                    &tx,
                    &assigned.member_id,
                    booking.start.timestamp(),
                    booking.end.timestamp(),
                    exclude,
                )? {
                    debug!(
                        booking = %booking.id,
                        member = %assigned.member_id,
                        "commit-time overlap detected"
                    );
                    return Err(BookwiseError::BookingConflict(format!(
                        "Member '{}' was booked concurrently for an overlapping slot",
                        assigned.member_id
                    )));
                }
            }
        }

        Self::write_booking_row(&tx, booking, replace)?;
        tx.commit().map_err(InfraError::from)?;
        Ok(())
    }
}

struct BookingRow {
    id: String,
    department_id: String,
    meeting_type_id: String,
    title: String,
    start_ts: i64,
    end_ts: i64,
    status: String,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    is_internal: bool,
    booking_reference: String,
    cancel_token: String,
    reschedule_token: String,
    cancellation_reason: Option<String>,
    cancelled_at: Option<i64>,
    created_by: String,
    created_at: i64,
}

#[async_trait]
impl BookingsSource for SqliteBookingRepository {
    #[instrument(skip(self, statuses))]
    async fn find_overlapping(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<&str>,
    ) -> Result<Vec<Booking>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT DISTINCT {BOOKING_COLUMNS}
             FROM bookings b
             INNER JOIN booking_members bm ON bm.booking_id = b.id
             WHERE bm.member_id = ?1
               AND b.status IN ({})
               AND b.start_ts < ?2
               AND b.end_ts > ?3
               AND (?4 IS NULL OR b.id != ?4)
             ORDER BY b.start_ts",
            status_list(statuses)
        );
        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(
                params![member_id, end.timestamp(), start.timestamp(), exclude],
                Self::map_booking_row,
            )
            .map_err(InfraError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;

        rows.into_iter().map(|row| Self::hydrate(&conn, row)).collect()
    }

    #[instrument(skip(self, statuses))]
    async fn count_between(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
    ) -> Result<u32> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT COUNT(DISTINCT b.id)
             FROM bookings b
             INNER JOIN booking_members bm ON bm.booking_id = b.id
             WHERE bm.member_id = ?1
               AND b.status IN ({})
               AND b.start_ts >= ?2
               AND b.start_ts < ?3",
            status_list(statuses)
        );
        let count: i64 = conn
            .query_row(&sql, params![member_id, start.timestamp(), end.timestamp()], |row| {
                row.get(0)
            })
            .map_err(InfraError::from)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl BookingStore for SqliteBookingRepository {
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn insert(&self, booking: &Booking) -> Result<()> {
        self.guarded_write(booking, false)
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    async fn update(&self, booking: &Booking) -> Result<()> {
        self.guarded_write(booking, true)
    }

    async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>> {
        self.find_by_column("id", booking_id)
    }

    async fn find_by_cancel_token(&self, token: &str) -> Result<Option<Booking>> {
        self.find_by_column("cancel_token", token)
    }

    async fn find_by_reschedule_token(&self, token: &str) -> Result<Option<Booking>> {
        self.find_by_column("reschedule_token", token)
    }

    async fn append_history(&self, entry: &BookingHistoryEntry) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO booking_history (id, booking_id, event_type, occurred_at, actor, \
             description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.booking_id,
                entry.event_type,
                entry.occurred_at.timestamp(),
                entry.actor,
                entry.description,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    async fn append_assignment_history(&self, entry: &AssignmentHistoryEntry) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO assignment_history (id, booking_id, action, member_id, occurred_at, \
             actor, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.booking_id,
                entry.action.to_string(),
                entry.member_id,
                entry.occurred_at.timestamp(),
                entry.actor,
                entry.notes,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}
