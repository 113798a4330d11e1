//! Shared fixtures for core service tests
#![allow(dead_code)]

pub mod repositories;

use bookwise_domain::{
    AvailabilityRule, Booking, BookingStatus, Customer, Department, DepartmentMember,
    ExternalEvent, EventSyncStatus, MeetingType, Member,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, min, 0).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn member(id: &str) -> Member {
    Member {
        id: id.into(),
        email: format!("{id}@example.com"),
        full_name: id.into(),
        timezone: "UTC".into(),
        is_enabled: true,
        created_at: utc(2024, 1, 1, 0, 0),
    }
}

pub fn department(id: &str, algorithm: Option<&str>) -> Department {
    Department {
        id: id.into(),
        name: format!("{id} department"),
        slug: id.into(),
        timezone: "UTC".into(),
        assignment_algorithm: algorithm.map(str::to_string),
        is_active: true,
    }
}

pub fn department_member(department_id: &str, member_id: &str) -> DepartmentMember {
    DepartmentMember {
        department_id: department_id.into(),
        member_id: member_id.into(),
        is_active: true,
        assignment_priority: 5,
        last_assigned_at: None,
        total_assignments: 0,
    }
}

pub fn meeting_type(id: &str, department_id: &str, duration_minutes: i64) -> MeetingType {
    MeetingType {
        id: id.into(),
        department_id: department_id.into(),
        name: format!("{id} meeting"),
        slug: id.into(),
        duration_minutes,
        is_public: true,
        is_internal: true,
        is_active: true,
        requires_approval: false,
        location_type: None,
        custom_location: None,
    }
}

pub fn rule(member_id: &str) -> AvailabilityRule {
    AvailabilityRule::unconstrained(member_id)
}

pub fn booking(
    id: &str,
    member_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Booking {
    Booking {
        id: id.into(),
        department_id: "support".into(),
        meeting_type_id: "intro".into(),
        title: format!("Booking {id}"),
        start,
        end,
        status: BookingStatus::Confirmed,
        assigned: vec![bookwise_domain::AssignedMember {
            member_id: member_id.into(),
            is_primary_host: true,
            assigned_by: "tester".into(),
            assigned_at: start,
        }],
        customer: None,
        is_internal: true,
        booking_reference: format!("BK-{}", id.to_uppercase()),
        cancel_token: format!("cancel-{id}"),
        reschedule_token: format!("resched-{id}"),
        cancellation_reason: None,
        cancelled_at: None,
        created_by: "tester".into(),
        created_at: start,
    }
}

pub fn customer() -> Customer {
    Customer { name: "Dana Visitor".into(), email: "dana@example.com".into(), phone: None }
}

pub fn external_event(
    id: &str,
    member_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ExternalEvent {
    ExternalEvent {
        id: id.into(),
        integration_id: "int-1".into(),
        member_id: member_id.into(),
        provider_event_id: format!("prov-{id}"),
        title: Some("External sync".into()),
        start,
        end,
        is_all_day: false,
        is_blocking: true,
        sync_status: EventSyncStatus::Synced,
        content_hash: "hash".into(),
        last_synced_at: start,
    }
}
