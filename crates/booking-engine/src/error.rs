//! Error types for booking-engine operations.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid timezone: {0}")]
    InvalidZone(String),

    #[error("Invalid assignment algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid department: {0}")]
    InvalidDepartment(String),

    #[error("Ambiguous local time {local} in {zone}: occurs twice (fall-back transition)")]
    DstAmbiguous { local: NaiveDateTime, zone: String },

    #[error("Nonexistent local time {local} in {zone}: skipped by spring-forward transition")]
    DstNonexistent { local: NaiveDateTime, zone: String },

    #[error("No eligible member for the requested slot")]
    NoEligibleMember,

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Assignment conflict: {0}")]
    AssignmentConflict(String),
}

impl BookingError {
    /// Whether re-running the same call later can succeed.
    ///
    /// Only collaborator fetch failures and stale-snapshot conflicts are
    /// transient; everything else is a caller or configuration bug.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::SnapshotUnavailable(_) | BookingError::AssignmentConflict(_)
        )
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidSchedule(_) => "invalid_schedule",
            BookingError::InvalidZone(_) => "invalid_zone",
            BookingError::InvalidAlgorithm(_) => "invalid_algorithm",
            BookingError::InvalidDuration(_) => "invalid_duration",
            BookingError::InvalidDateRange(_) => "invalid_date_range",
            BookingError::InvalidDepartment(_) => "invalid_department",
            BookingError::DstAmbiguous { .. } => "dst_ambiguous",
            BookingError::DstNonexistent { .. } => "dst_nonexistent",
            BookingError::NoEligibleMember => "no_eligible_member",
            BookingError::SnapshotUnavailable(_) => "snapshot_unavailable",
            BookingError::AssignmentConflict(_) => "assignment_conflict",
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
