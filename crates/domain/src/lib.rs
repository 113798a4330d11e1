//! # Bookwise Domain
//!
//! Business domain types and models for Bookwise.
//!
//! This crate contains:
//! - Domain data types (Member, Booking, Department, etc.)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and timezone utilities
//!
//! ## Architecture
//! - No dependencies on other Bookwise crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
// Re-export timezone utilities
pub use utils::timezone::{
    format_window, local_to_utc, resolve_day_start, utc_to_local, zone_is_valid,
};
