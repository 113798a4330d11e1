//! Calendar provider integrations and the periodic sync worker

pub mod providers;
pub mod sync;

pub use providers::{CalendarProvider, ProviderEvent};
pub use sync::CalendarSyncWorker;
