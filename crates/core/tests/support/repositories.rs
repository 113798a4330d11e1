//! In-memory mock implementations of every core port
//!
//! One backend implements all port traits so a single `Arc` can be handed
//! to every service under test. State lives behind mutexes; builder-style
//! seeding keeps tests declarative.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookwise_core::availability::ports::{
    AvailabilityRuleSource, BookingsSource, CalendarEventsSource, DateOverrideSource,
    MemberDirectory, WorkingHoursSource,
};
use bookwise_core::assignment::ports::DepartmentSource;
use bookwise_core::booking::ports::BookingStore;
use bookwise_core::slots::ports::MeetingTypeSource;
use bookwise_domain::{
    AssignmentHistoryEntry, AvailabilityRule, Booking, BookingHistoryEntry, BookingStatus,
    BookwiseError, DateOverride, Department, DepartmentMember, ExternalEvent, MeetingType, Member,
    Result as DomainResult, WorkingHours,
};
use chrono::{DateTime, NaiveDate, Utc};

/// In-memory backend implementing all core ports.
#[derive(Default)]
pub struct InMemoryBackend {
    pub members: Mutex<Vec<Member>>,
    pub working_hours: Mutex<Vec<(String, WorkingHours)>>,
    pub overrides: Mutex<Vec<DateOverride>>,
    pub rules: Mutex<Vec<AvailabilityRule>>,
    pub bookings: Mutex<Vec<Booking>>,
    pub events: Mutex<Vec<ExternalEvent>>,
    pub departments: Mutex<Vec<Department>>,
    pub department_members: Mutex<Vec<DepartmentMember>>,
    pub meeting_types: Mutex<Vec<MeetingType>>,
    pub history: Mutex<Vec<BookingHistoryEntry>>,
    pub assignment_history: Mutex<Vec<AssignmentHistoryEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_member(&self, member: Member) -> &Self {
        self.members.lock().unwrap().push(member);
        self
    }

    pub fn add_working_hours(&self, member_id: &str, hours: WorkingHours) -> &Self {
        self.working_hours.lock().unwrap().push((member_id.to_string(), hours));
        self
    }

    pub fn add_override(&self, ov: DateOverride) -> &Self {
        self.overrides.lock().unwrap().push(ov);
        self
    }

    pub fn add_rule(&self, rule: AvailabilityRule) -> &Self {
        self.rules.lock().unwrap().push(rule);
        self
    }

    pub fn add_booking(&self, booking: Booking) -> &Self {
        self.bookings.lock().unwrap().push(booking);
        self
    }

    pub fn add_event(&self, event: ExternalEvent) -> &Self {
        self.events.lock().unwrap().push(event);
        self
    }

    pub fn add_department(&self, department: Department) -> &Self {
        self.departments.lock().unwrap().push(department);
        self
    }

    pub fn add_department_member(&self, member: DepartmentMember) -> &Self {
        self.department_members.lock().unwrap().push(member);
        self
    }

    pub fn add_meeting_type(&self, meeting_type: MeetingType) -> &Self {
        self.meeting_types.lock().unwrap().push(meeting_type);
        self
    }

    pub fn booking_by_id(&self, id: &str) -> Option<Booking> {
        self.bookings.lock().unwrap().iter().find(|b| b.id == id).cloned()
    }

    pub fn department_member(&self, department_id: &str, member_id: &str) -> Option<DepartmentMember> {
        self.department_members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.department_id == department_id && m.member_id == member_id)
            .cloned()
    }

    fn booking_is_assigned(booking: &Booking, member_id: &str) -> bool {
        booking.assigned.iter().any(|a| a.member_id == member_id)
    }
}

#[async_trait]
impl MemberDirectory for InMemoryBackend {
    async fn find_member(&self, member_id: &str) -> DomainResult<Option<Member>> {
        Ok(self.members.lock().unwrap().iter().find(|m| m.id == member_id).cloned())
    }
}

#[async_trait]
impl WorkingHoursSource for InMemoryBackend {
    async fn working_hours(&self, member_id: &str) -> DomainResult<Option<WorkingHours>> {
        Ok(self
            .working_hours
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == member_id)
            .map(|(_, hours)| hours.clone()))
    }
}

#[async_trait]
impl DateOverrideSource for InMemoryBackend {
    async fn override_for_date(
        &self,
        member_id: &str,
        date: NaiveDate,
    ) -> DomainResult<Option<DateOverride>> {
        Ok(self
            .overrides
            .lock()
            .unwrap()
            .iter()
            .find(|ov| ov.member_id == member_id && ov.date == date)
            .cloned())
    }
}

#[async_trait]
impl AvailabilityRuleSource for InMemoryBackend {
    async fn default_rule(&self, member_id: &str) -> DomainResult<Option<AvailabilityRule>> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.member_id == member_id && r.is_default)
            .cloned())
    }
}

#[async_trait]
impl BookingsSource for InMemoryBackend {
    async fn find_overlapping(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
        exclude: Option<&str>,
    ) -> DomainResult<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| Self::booking_is_assigned(b, member_id))
            .filter(|b| statuses.contains(&b.status))
            .filter(|b| exclude != Some(b.id.as_str()))
            .filter(|b| b.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn count_between(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[BookingStatus],
    ) -> DomainResult<u32> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| Self::booking_is_assigned(b, member_id))
            .filter(|b| statuses.contains(&b.status))
            .filter(|b| b.start >= start && b.start < end)
            .count() as u32)
    }
}

#[async_trait]
impl CalendarEventsSource for InMemoryBackend {
    async fn blocking_events(
        &self,
        member_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<ExternalEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.member_id == member_id)
            .filter(|e| e.blocks_window(start, end))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DepartmentSource for InMemoryBackend {
    async fn find_department(&self, department_id: &str) -> DomainResult<Option<Department>> {
        Ok(self.departments.lock().unwrap().iter().find(|d| d.id == department_id).cloned())
    }

    async fn find_department_by_slug(&self, slug: &str) -> DomainResult<Option<Department>> {
        Ok(self.departments.lock().unwrap().iter().find(|d| d.slug == slug).cloned())
    }

    async fn active_members(&self, department_id: &str) -> DomainResult<Vec<DepartmentMember>> {
        Ok(self
            .department_members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.department_id == department_id && m.is_active)
            .cloned()
            .collect())
    }

    async fn all_members(&self, department_id: &str) -> DomainResult<Vec<DepartmentMember>> {
        Ok(self
            .department_members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.department_id == department_id)
            .cloned()
            .collect())
    }

    async fn is_active_member(
        &self,
        department_id: &str,
        member_id: &str,
    ) -> DomainResult<bool> {
        Ok(self
            .department_members
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.department_id == department_id && m.member_id == member_id && m.is_active))
    }

    async fn record_assignment(
        &self,
        department_id: &str,
        member_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut members = self.department_members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.department_id == department_id && m.member_id == member_id)
            .ok_or_else(|| {
                BookwiseError::NotFound(format!(
                    "No membership for '{member_id}' in '{department_id}'"
                ))
            })?;
        member.last_assigned_at = Some(at);
        member.total_assignments += 1;
        Ok(())
    }
}

#[async_trait]
impl MeetingTypeSource for InMemoryBackend {
    async fn find_meeting_type(&self, meeting_type_id: &str) -> DomainResult<Option<MeetingType>> {
        Ok(self
            .meeting_types
            .lock()
            .unwrap()
            .iter()
            .find(|mt| mt.id == meeting_type_id)
            .cloned())
    }

    async fn find_by_slug(
        &self,
        department_id: &str,
        slug: &str,
    ) -> DomainResult<Option<MeetingType>> {
        Ok(self
            .meeting_types
            .lock()
            .unwrap()
            .iter()
            .find(|mt| mt.department_id == department_id && mt.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl BookingStore for InMemoryBackend {
    async fn insert(&self, booking: &Booking) -> DomainResult<()> {
        let mut bookings = self.bookings.lock().unwrap();
        for assigned in &booking.assigned {
            let clash = bookings.iter().any(|b| {
                b.status.blocks_availability()
                    && Self::booking_is_assigned(b, &assigned.member_id)
                    && b.overlaps(booking.start, booking.end)
            });
            if clash {
                return Err(BookwiseError::BookingConflict(format!(
                    "Member '{}' was booked concurrently for an overlapping slot",
                    assigned.member_id
                )));
            }
        }
        bookings.push(booking.clone());
        Ok(())
    }

    async fn update(&self, booking: &Booking) -> DomainResult<()> {
        let mut bookings = self.bookings.lock().unwrap();
        for assigned in &booking.assigned {
            let clash = bookings.iter().any(|b| {
                b.id != booking.id
                    && b.status.blocks_availability()
                    && Self::booking_is_assigned(b, &assigned.member_id)
                    && b.overlaps(booking.start, booking.end)
            });
            if clash {
                return Err(BookwiseError::BookingConflict(format!(
                    "Member '{}' was booked concurrently for an overlapping slot",
                    assigned.member_id
                )));
            }
        }
        match bookings.iter_mut().find(|b| b.id == booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(BookwiseError::NotFound(format!("Booking '{}' not found", booking.id))),
        }
    }

    async fn find_by_id(&self, booking_id: &str) -> DomainResult<Option<Booking>> {
        Ok(self.bookings.lock().unwrap().iter().find(|b| b.id == booking_id).cloned())
    }

    async fn find_by_cancel_token(&self, token: &str) -> DomainResult<Option<Booking>> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.cancel_token == token)
            .cloned())
    }

    async fn find_by_reschedule_token(&self, token: &str) -> DomainResult<Option<Booking>> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.reschedule_token == token)
            .cloned())
    }

    async fn append_history(&self, entry: &BookingHistoryEntry) -> DomainResult<()> {
        self.history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn append_assignment_history(
        &self,
        entry: &AssignmentHistoryEntry,
    ) -> DomainResult<()> {
        self.assignment_history.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
