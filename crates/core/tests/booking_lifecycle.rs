//! Booking lifecycle: creation, tokens, status transitions, races

mod support;

use std::sync::Arc;

use bookwise_core::availability::ports::{
    AvailabilityRuleSource, BookingsSource, CalendarEventsSource, DateOverrideSource,
    MemberDirectory, WorkingHoursSource,
};
use bookwise_core::assignment::ports::DepartmentSource;
use bookwise_core::booking::ports::BookingStore;
use bookwise_core::slots::ports::MeetingTypeSource;
use bookwise_core::{
    AvailabilityService, BookingLifecycleService, NewBooking, NewBookingMember,
};
use bookwise_domain::{BookingStatus, BookwiseError};

use support::repositories::InMemoryBackend;
use support::{
    booking, customer, date, department, department_member, meeting_type, member, time, utc,
};

fn lifecycle(backend: &Arc<InMemoryBackend>) -> BookingLifecycleService {
    let availability = Arc::new(AvailabilityService::new(
        backend.clone() as Arc<dyn MemberDirectory>,
        backend.clone() as Arc<dyn WorkingHoursSource>,
        backend.clone() as Arc<dyn DateOverrideSource>,
        backend.clone() as Arc<dyn BookingsSource>,
        backend.clone() as Arc<dyn CalendarEventsSource>,
        backend.clone() as Arc<dyn AvailabilityRuleSource>,
    ));
    BookingLifecycleService::new(
        backend.clone() as Arc<dyn BookingStore>,
        backend.clone() as Arc<dyn DepartmentSource>,
        backend.clone() as Arc<dyn MeetingTypeSource>,
        availability,
    )
}

fn seed(backend: &Arc<InMemoryBackend>) {
    backend
        .add_department(department("sales", Some("round_robin")))
        .add_meeting_type(meeting_type("intro", "sales", 30))
        .add_member(member("alice"))
        .add_department_member(department_member("sales", "alice"));
}

fn new_booking() -> NewBooking {
    NewBooking {
        department_id: "sales".into(),
        meeting_type_id: "intro".into(),
        title: "Intro call".into(),
        date: date(2024, 6, 3),
        start_time: time(10, 0),
        members: vec![NewBookingMember { member_id: "alice".into(), is_primary_host: true }],
        customer: Some(customer()),
        is_internal: false,
        actor: "booking-portal".into(),
    }
}

#[tokio::test]
async fn creation_persists_booking_with_tokens_and_history() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();

    assert_eq!(created.status, BookingStatus::Confirmed);
    assert_eq!(created.start, utc(2024, 6, 3, 10, 0));
    assert_eq!(created.end, utc(2024, 6, 3, 10, 30));
    assert!(created.booking_reference.starts_with("BK-"));
    assert!(!created.cancel_token.is_empty());
    assert!(!created.reschedule_token.is_empty());
    assert_ne!(created.cancel_token, created.reschedule_token);

    let stored = backend.booking_by_id(&created.id).unwrap();
    assert_eq!(stored.primary_host().unwrap().member_id, "alice");

    let history = backend.history.lock().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, "created");
    assert_eq!(history[0].actor, "booking-portal");
}

#[tokio::test]
async fn approval_required_meeting_types_start_pending() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    {
        let mut types = backend.meeting_types.lock().unwrap();
        types[0].requires_approval = true;
    }
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();
    assert_eq!(created.status, BookingStatus::Pending);
}

#[tokio::test]
async fn creation_rejects_unavailable_slot_as_policy_error() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    backend.add_booking(booking("b1", "alice", utc(2024, 6, 3, 10, 0), utc(2024, 6, 3, 11, 0)));
    let svc = lifecycle(&backend);

    let err = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap_err();

    match &err {
        BookwiseError::SlotUnavailable(reason) => {
            assert!(reason.contains("BK-B1"), "{reason}");
        }
        other => panic!("expected SlotUnavailable, got {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn commit_race_surfaces_retryable_conflict() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    // First request passes evaluation and commits.
    svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();

    // Simulate the race: a second request for the same slot whose evaluation
    // already ran before the first committed, now reaching the store. The
    // store-level guard must reject it with the retryable conflict, not a
    // policy error.
    let late_arrival = booking("race", "alice", utc(2024, 6, 3, 10, 0), utc(2024, 6, 3, 10, 30));
    let err = (backend.as_ref() as &dyn BookingStore)
        .insert(&late_arrival)
        .await
        .unwrap_err();

    assert!(err.is_retryable(), "commit-time conflicts are retryable: {err:?}");
    assert!(matches!(err, BookwiseError::BookingConflict(_)));
}

#[tokio::test]
async fn past_bookings_cannot_be_created() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let err = svc.create_booking(new_booking(), utc(2024, 6, 10, 8, 0)).await.unwrap_err();
    assert!(matches!(err, BookwiseError::InvalidInput(_)));
}

#[tokio::test]
async fn external_booking_requires_customer() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let mut request = new_booking();
    request.customer = None;
    let err = svc.create_booking(request, utc(2024, 6, 1, 8, 0)).await.unwrap_err();
    assert!(matches!(err, BookwiseError::InvalidInput(_)));
}

#[tokio::test]
async fn cancel_token_cancels_once_then_reports_state() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();

    let cancelled = svc
        .cancel_by_token(&created.cancel_token, utc(2024, 6, 2, 8, 0))
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Customer cancelled"));
    assert_eq!(cancelled.cancelled_at, Some(utc(2024, 6, 2, 8, 0)));

    // Second use of the token: the error names the booking's actual state.
    let err = svc
        .cancel_by_token(&created.cancel_token, utc(2024, 6, 2, 9, 0))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid input: This booking has already been cancelled"
    );
}

#[tokio::test]
async fn completed_bookings_refuse_token_mutations() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();
    svc.update_status(&created.id, BookingStatus::Completed, "staff", None, utc(2024, 6, 3, 12, 0))
        .await
        .unwrap();

    let err = svc
        .reschedule_by_token(&created.reschedule_token, date(2024, 6, 4), time(10, 0), utc(2024, 6, 3, 13, 0))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already been completed"), "{err}");
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let err = svc.cancel_by_token("bogus", utc(2024, 6, 1, 8, 0)).await.unwrap_err();
    assert!(matches!(err, BookwiseError::NotFound(_)));
}

#[tokio::test]
async fn reschedule_by_token_moves_the_window_in_place() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();

    // Same day, one hour later: the booking's own slot must not block it.
    let moved = svc
        .reschedule_by_token(&created.reschedule_token, date(2024, 6, 3), time(11, 0), utc(2024, 6, 2, 8, 0))
        .await
        .unwrap();

    assert_eq!(moved.start, utc(2024, 6, 3, 11, 0));
    assert_eq!(moved.end, utc(2024, 6, 3, 11, 30));

    let history = backend.history.lock().unwrap();
    assert!(history.iter().any(|h| h.event_type == "rescheduled"));
}

#[tokio::test]
async fn reschedule_rejects_an_occupied_target() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();
    backend.add_booking(booking("b2", "alice", utc(2024, 6, 3, 14, 0), utc(2024, 6, 3, 15, 0)));

    let err = svc
        .reschedule_by_token(&created.reschedule_token, date(2024, 6, 3), time(14, 0), utc(2024, 6, 2, 8, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, BookwiseError::SlotUnavailable(_)));
}

#[tokio::test]
async fn future_bookings_cannot_be_marked_completed_or_no_show() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();

    let err = svc
        .update_status(&created.id, BookingStatus::NoShow, "staff", None, utc(2024, 6, 2, 8, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, BookwiseError::InvalidInput(_)));
}

#[tokio::test]
async fn reassignment_swaps_primary_host_and_audits() {
    let backend = InMemoryBackend::new();
    seed(&backend);
    backend.add_member(member("bob")).add_department_member(department_member("sales", "bob"));
    let svc = lifecycle(&backend);

    let created = svc.create_booking(new_booking(), utc(2024, 6, 1, 8, 0)).await.unwrap();

    let reassigned = svc
        .reassign(&created.id, "bob", "manager", Some("Alice is out sick"), utc(2024, 6, 2, 8, 0))
        .await
        .unwrap();

    assert_eq!(reassigned.primary_host().unwrap().member_id, "bob");

    let audit = backend.assignment_history.lock().unwrap();
    let actions: Vec<String> = audit.iter().map(|a| a.action.to_string()).collect();
    assert!(actions.contains(&"unassigned".to_string()));
    assert!(actions.contains(&"assigned".to_string()));
    assert!(actions.contains(&"primary-changed".to_string()));
    assert!(audit.iter().all(|a| a.actor == "manager"));
}
