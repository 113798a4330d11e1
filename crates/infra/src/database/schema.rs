//! Database schema
//!
//! Applied idempotently on pool construction. Timestamps are stored as Unix
//! epoch seconds, wall-clock times as `HH:MM` text, dates as `YYYY-MM-DD`
//! text, and status enums as their canonical lowercase strings.

use bookwise_domain::Result;
use rusqlite::Connection;

use crate::errors::InfraError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    full_name TEXT NOT NULL,
    timezone TEXT NOT NULL,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS working_hours (
    member_id TEXT NOT NULL REFERENCES members(id),
    weekday INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),
    enabled INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    PRIMARY KEY (member_id, weekday)
);

CREATE TABLE IF NOT EXISTS availability_rules (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL REFERENCES members(id),
    buffer_before_minutes INTEGER NOT NULL DEFAULT 0,
    buffer_after_minutes INTEGER NOT NULL DEFAULT 0,
    max_bookings_per_day INTEGER,
    max_bookings_per_week INTEGER,
    min_notice_hours INTEGER,
    max_days_advance INTEGER,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS date_overrides (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL REFERENCES members(id),
    date TEXT NOT NULL,
    available INTEGER NOT NULL,
    custom_start TEXT,
    custom_end TEXT,
    reason TEXT,
    UNIQUE (member_id, date)
);

CREATE TABLE IF NOT EXISTS departments (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    timezone TEXT NOT NULL,
    assignment_algorithm TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS department_members (
    department_id TEXT NOT NULL REFERENCES departments(id),
    member_id TEXT NOT NULL REFERENCES members(id),
    is_active INTEGER NOT NULL DEFAULT 1,
    assignment_priority INTEGER NOT NULL DEFAULT 5,
    last_assigned_at INTEGER,
    total_assignments INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (department_id, member_id)
);

CREATE TABLE IF NOT EXISTS meeting_types (
    id TEXT PRIMARY KEY,
    department_id TEXT NOT NULL REFERENCES departments(id),
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    is_public INTEGER NOT NULL DEFAULT 1,
    is_internal INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    requires_approval INTEGER NOT NULL DEFAULT 0,
    location_type TEXT,
    custom_location TEXT,
    UNIQUE (department_id, slug)
);

CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    department_id TEXT NOT NULL REFERENCES departments(id),
    meeting_type_id TEXT NOT NULL REFERENCES meeting_types(id),
    title TEXT NOT NULL,
    start_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL CHECK (end_ts > start_ts),
    status TEXT NOT NULL,
    customer_name TEXT,
    customer_email TEXT,
    customer_phone TEXT,
    is_internal INTEGER NOT NULL DEFAULT 0,
    booking_reference TEXT NOT NULL UNIQUE,
    cancel_token TEXT NOT NULL UNIQUE,
    reschedule_token TEXT NOT NULL UNIQUE,
    cancellation_reason TEXT,
    cancelled_at INTEGER,
    created_by TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS booking_members (
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    member_id TEXT NOT NULL REFERENCES members(id),
    is_primary_host INTEGER NOT NULL DEFAULT 0,
    assigned_by TEXT NOT NULL,
    assigned_at INTEGER NOT NULL,
    PRIMARY KEY (booking_id, member_id)
);

CREATE TABLE IF NOT EXISTS booking_history (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    event_type TEXT NOT NULL,
    occurred_at INTEGER NOT NULL,
    actor TEXT NOT NULL,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignment_history (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    action TEXT NOT NULL,
    member_id TEXT NOT NULL,
    occurred_at INTEGER NOT NULL,
    actor TEXT NOT NULL,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS calendar_integrations (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL REFERENCES members(id),
    account_email TEXT NOT NULL,
    provider TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_connected INTEGER NOT NULL DEFAULT 0,
    last_sync INTEGER,
    sync_status TEXT,
    sync_error TEXT
);

CREATE TABLE IF NOT EXISTS calendar_events (
    id TEXT PRIMARY KEY,
    integration_id TEXT NOT NULL REFERENCES calendar_integrations(id),
    member_id TEXT NOT NULL REFERENCES members(id),
    provider_event_id TEXT NOT NULL,
    title TEXT,
    start_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL,
    is_all_day INTEGER NOT NULL DEFAULT 0,
    is_blocking INTEGER NOT NULL DEFAULT 1,
    sync_status TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    last_synced_at INTEGER NOT NULL,
    UNIQUE (integration_id, provider_event_id)
);

CREATE INDEX IF NOT EXISTS idx_bookings_window ON bookings (start_ts, end_ts);
CREATE INDEX IF NOT EXISTS idx_booking_members_member ON booking_members (member_id);
CREATE INDEX IF NOT EXISTS idx_calendar_events_member ON calendar_events (member_id, start_ts);
CREATE INDEX IF NOT EXISTS idx_date_overrides_member ON date_overrides (member_id, date);
";

/// Apply the schema to a fresh or existing database.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).map_err(|e| InfraError::from(e).into())
}
