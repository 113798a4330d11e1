//! SQLite-backed implementations of the core repository ports

pub mod availability_repository;
pub mod booking_repository;
pub mod calendar_repository;
pub mod department_repository;
pub mod manager;
pub mod member_repository;
pub mod schema;

mod codec;

pub use availability_repository::SqliteAvailabilityRepository;
pub use booking_repository::SqliteBookingRepository;
pub use calendar_repository::SqliteCalendarRepository;
pub use department_repository::SqliteDepartmentRepository;
pub use member_repository::SqliteMemberRepository;
