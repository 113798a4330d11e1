//! Department, membership, and meeting type records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// How a department distributes auto-assigned bookings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentAlgorithm {
    RoundRobin,
    LeastBusy,
}

impl_status_conversions!(AssignmentAlgorithm {
    RoundRobin => "round_robin",
    LeastBusy => "least_busy",
});

/// Organizational unit owning members and an assignment algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub slug: String,
    /// IANA timezone all wall-clock scheduling inputs are interpreted in
    pub timezone: String,
    /// Stored as configured; unknown values fall back to round robin at
    /// assignment time, `None` means not configured at all.
    pub assignment_algorithm: Option<String>,
    pub is_active: bool,
}

/// A member's standing within one department, including assignment tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentMember {
    pub department_id: String,
    pub member_id: String,
    pub is_active: bool,
    /// 1 (lowest) to 10 (highest)
    pub assignment_priority: u8,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub total_assignments: u64,
}

/// Where a meeting takes place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    VideoCall,
    PhysicalLocation,
    PhoneCall,
}

impl_status_conversions!(LocationType {
    VideoCall => "video_call",
    PhysicalLocation => "physical_location",
    PhoneCall => "phone_call",
});

/// A bookable service definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingType {
    pub id: String,
    pub department_id: String,
    pub name: String,
    pub slug: String,
    pub duration_minutes: i64,
    pub is_public: bool,
    pub is_internal: bool,
    pub is_active: bool,
    pub requires_approval: bool,
    pub location_type: Option<LocationType>,
    pub custom_location: Option<String>,
}
