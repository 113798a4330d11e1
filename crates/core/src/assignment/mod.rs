//! Assignment selection - distributing bookings across department members
//!
//! Filters a department's active members through the availability evaluator,
//! then picks one with the department's configured algorithm:
//!
//! - **Round Robin**: the longest-idle member (oldest `last_assigned_at`,
//!   never-assigned sorts first) is always chosen next.
//! - **Least Busy**: fewest blocking bookings in the 7-day window starting
//!   at the requested date, tie-broken by the Round Robin rule.
//!
//! A department without a configured algorithm fails assignment outright; a
//! department with an unrecognized value falls back to Round Robin and tags
//! the returned method with "(default)".

pub mod ports;

use std::str::FromStr;
use std::sync::Arc;

use bookwise_domain::constants::{LEAST_BUSY_WINDOW_DAYS, WORKLOAD_IMBALANCE_THRESHOLD};
use bookwise_domain::utils::timezone::resolve_day_start;
use bookwise_domain::{
    AssignmentAlgorithm, BookingStatus, BookwiseError, Department, DepartmentMember, Result,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::availability::ports::BookingsSource;
use crate::availability::{AvailabilityRequest, AvailabilityService};
use ports::DepartmentSource;

/// Instant used to rank members that have never been assigned: older than
/// any real assignment, so they always sort first.
fn never_assigned() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Outcome of a successful auto-assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub member_id: String,
    /// "Round Robin", "Least Busy", or "Round Robin (default)"
    pub method: String,
    pub reason: String,
}

/// Per-member assignment statistics for a department
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberAssignmentStats {
    pub member_id: String,
    pub is_active: bool,
    pub total_assignments: u64,
    /// Bookings assigned within the lookback window
    pub recent_bookings: u32,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

/// Workload balance verdict across a department's active members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadReport {
    pub balanced: bool,
    pub average_recent_bookings: f64,
    pub overloaded: Vec<MemberAssignmentStats>,
    pub underloaded: Vec<MemberAssignmentStats>,
}

/// Assignment selector
pub struct AssignmentService {
    departments: Arc<dyn DepartmentSource>,
    bookings: Arc<dyn BookingsSource>,
    availability: Arc<AvailabilityService>,
}

impl AssignmentService {
    pub fn new(
        departments: Arc<dyn DepartmentSource>,
        bookings: Arc<dyn BookingsSource>,
        availability: Arc<AvailabilityService>,
    ) -> Self {
        Self { departments, bookings, availability }
    }

    /// Auto-assign the requested window to an available department member.
    ///
    /// On success the chosen member's tracking counters are updated through
    /// the department source's atomic per-member update. Evaluation and the
    /// final booking commit remain two steps; the storage layer must still
    /// guard the commit against a concurrent winner (see `BookingStore`).
    pub async fn assign(
        &self,
        department_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let department = self
            .departments
            .find_department(department_id)
            .await?
            .ok_or_else(|| {
                BookwiseError::NotFound(format!("Department '{department_id}' not found"))
            })?;

        let candidates = self.departments.active_members(department_id).await?;
        if candidates.is_empty() {
            return Err(BookwiseError::NoAvailableMember(format!(
                "No active members in department '{}'",
                department.name
            )));
        }

        let available = self
            .filter_available(&department, &candidates, date, start_time, duration_minutes)
            .await?;
        if available.is_empty() {
            return Err(BookwiseError::NoAvailableMember(format!(
                "No members available in department '{}' at the requested time. \
                 Please choose a different time slot.",
                department.name
            )));
        }

        let (chosen, method) = match configured_algorithm(&department)? {
            ResolvedAlgorithm::Configured(AssignmentAlgorithm::RoundRobin) => {
                (pick_round_robin(&available), "Round Robin".to_string())
            }
            ResolvedAlgorithm::Configured(AssignmentAlgorithm::LeastBusy) => (
                self.pick_least_busy(&department, &available, date).await?,
                "Least Busy".to_string(),
            ),
            ResolvedAlgorithm::Fallback => {
                (pick_round_robin(&available), "Round Robin (default)".to_string())
            }
        };

        self.departments
            .record_assignment(department_id, &chosen, now)
            .await?;

        info!(
            department = %department_id,
            member = %chosen,
            method = %method,
            "booking auto-assigned"
        );

        Ok(Assignment {
            member_id: chosen,
            reason: format!("Assigned using {method} algorithm"),
            method,
        })
    }

    /// Assignment statistics for a department, busiest members first.
    pub async fn statistics(
        &self,
        department_id: &str,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<Vec<MemberAssignmentStats>> {
        let members = self.departments.all_members(department_id).await?;
        let window_start = now - Duration::days(lookback_days);
        let counted = &[
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
        ];

        let mut stats = Vec::with_capacity(members.len());
        for member in members {
            let recent = self
                .bookings
                .count_between(&member.member_id, window_start, now, counted)
                .await?;
            stats.push(MemberAssignmentStats {
                member_id: member.member_id,
                is_active: member.is_active,
                total_assignments: member.total_assignments,
                recent_bookings: recent,
                last_assigned_at: member.last_assigned_at,
            });
        }

        stats.sort_by(|a, b| b.recent_bookings.cmp(&a.recent_bookings));
        Ok(stats)
    }

    /// Flag members carrying significantly more or less than the average
    /// recent workload, to surface a misbehaving algorithm or availability
    /// setup.
    pub async fn workload_report(
        &self,
        department_id: &str,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<WorkloadReport> {
        let stats = self.statistics(department_id, now, lookback_days).await?;
        let active: Vec<MemberAssignmentStats> =
            stats.into_iter().filter(|s| s.is_active).collect();

        if active.is_empty() {
            return Ok(WorkloadReport {
                balanced: true,
                average_recent_bookings: 0.0,
                overloaded: Vec::new(),
                underloaded: Vec::new(),
            });
        }

        let total: u64 = active.iter().map(|s| u64::from(s.recent_bookings)).sum();
        let average = total as f64 / active.len() as f64;
        let threshold = average * WORKLOAD_IMBALANCE_THRESHOLD;

        let overloaded: Vec<MemberAssignmentStats> = active
            .iter()
            .filter(|s| f64::from(s.recent_bookings) > average + threshold)
            .cloned()
            .collect();
        let underloaded: Vec<MemberAssignmentStats> = active
            .iter()
            .filter(|s| f64::from(s.recent_bookings) < average - threshold)
            .cloned()
            .collect();

        Ok(WorkloadReport {
            balanced: overloaded.is_empty() && underloaded.is_empty(),
            average_recent_bookings: average,
            overloaded,
            underloaded,
        })
    }

    async fn filter_available(
        &self,
        department: &Department,
        candidates: &[DepartmentMember],
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i64,
    ) -> Result<Vec<DepartmentMember>> {
        let mut available = Vec::new();
        for candidate in candidates {
            let request = AvailabilityRequest::new(
                candidate.member_id.as_str(),
                department.timezone.as_str(),
                date,
                start_time,
                duration_minutes,
            );
            let evaluation = self.availability.evaluate(&request).await?;
            if evaluation.available {
                available.push(candidate.clone());
            } else {
                debug!(
                    member = %candidate.member_id,
                    reason = evaluation.primary_reason.as_deref().unwrap_or(""),
                    "candidate filtered out"
                );
            }
        }
        Ok(available)
    }

    async fn pick_least_busy(
        &self,
        department: &Department,
        available: &[DepartmentMember],
        date: NaiveDate,
    ) -> Result<String> {
        let window_start = resolve_day_start(date, &department.timezone)?;
        let window_end =
            resolve_day_start(date + Duration::days(LEAST_BUSY_WINDOW_DAYS), &department.timezone)?;
        let blocking = BookingStatus::blocking_statuses();

        let mut ranked = Vec::with_capacity(available.len());
        for member in available {
            let count = self
                .bookings
                .count_between(&member.member_id, window_start, window_end, blocking)
                .await?;
            ranked.push((count, member));
        }

        ranked.sort_by(|(count_a, a), (count_b, b)| {
            count_a
                .cmp(count_b)
                .then_with(|| rank_key(a).cmp(&rank_key(b)))
        });

        ranked
            .first()
            .map(|(_, member)| member.member_id.clone())
            .ok_or_else(|| BookwiseError::Internal("least-busy ranking on empty set".into()))
    }
}

enum ResolvedAlgorithm {
    Configured(AssignmentAlgorithm),
    Fallback,
}

/// Resolve the department's configured algorithm string. Unset fails the
/// assignment; an unrecognized value is tolerated and falls back.
fn configured_algorithm(department: &Department) -> Result<ResolvedAlgorithm> {
    match department.assignment_algorithm.as_deref() {
        None | Some("") => Err(BookwiseError::NoAssignmentAlgorithm(department.name.clone())),
        Some(raw) => Ok(AssignmentAlgorithm::from_str(raw)
            .map(ResolvedAlgorithm::Configured)
            .unwrap_or(ResolvedAlgorithm::Fallback)),
    }
}

/// Deterministic Round Robin ranking key: oldest assignment first, member id
/// as the final tie-breaker so equal timestamps still order stably.
fn rank_key(member: &DepartmentMember) -> (DateTime<Utc>, &str) {
    (
        member.last_assigned_at.unwrap_or_else(never_assigned),
        member.member_id.as_str(),
    )
}

fn pick_round_robin(available: &[DepartmentMember]) -> String {
    let mut ranked: Vec<&DepartmentMember> = available.iter().collect();
    ranked.sort_by(|a, b| rank_key(a).cmp(&rank_key(b)));
    ranked
        .first()
        .map(|m| m.member_id.clone())
        .unwrap_or_default()
}
