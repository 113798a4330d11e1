//! # Bookwise Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The availability evaluator and its conflict sources
//! - Assignment selection (round robin / least busy)
//! - Slot and date enumeration for the public booking surface
//! - The booking lifecycle service
//! - Port/adapter interfaces (traits) for all data sources
//!
//! ## Architecture Principles
//! - Only depends on `bookwise-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod assignment;
pub mod availability;
pub mod booking;
pub mod slots;

// Re-export specific items to avoid ambiguity
pub use assignment::ports::DepartmentSource;
pub use assignment::{Assignment, AssignmentService, MemberAssignmentStats, WorkloadReport};
pub use availability::ports::{
    AvailabilityRuleSource, BookingsSource, CalendarEventsSource, DateOverrideSource,
    MemberDirectory, WorkingHoursSource,
};
pub use availability::{
    AvailabilityRequest, AvailabilityService, Conflict, ConflictKind, Evaluation, TemporalCheck,
};
pub use booking::ports::BookingStore;
pub use booking::{BookingLifecycleService, NewBooking, NewBookingMember};
pub use slots::ports::MeetingTypeSource;
pub use slots::{Audience, AvailableDates, DaySlots, SlotService, SlotView};
