//! Department and member snapshots.
//!
//! These are read-only projections of records owned by the persistence
//! layer. A snapshot is fetched once per computation, validated here, and
//! never cached by the engine. The only fields the engine ever changes are
//! the fairness counters, and it does so by returning a
//! [`CounterUpdate`](crate::assignment::CounterUpdate) value, not by mutating
//! storage.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::schedule::{validate_overrides, DateOverride, WeeklySchedule};
use crate::slots::{Booking, Interval, SlotConstraints};
use crate::timezone::ZoneId;

const MAX_BUFFER_MINUTES: u32 = 240;
const MAX_PER_DAY: u32 = 50;
const MAX_PER_WEEK: u32 = 200;
const MAX_NOTICE_HOURS: u32 = 720;
const MAX_DAYS_ADVANCE: u32 = 365;

// ── MemberId ────────────────────────────────────────────────────────────────

/// External user reference of a department member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Algorithm ───────────────────────────────────────────────────────────────

/// How a department distributes bookings among eligible members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// Whoever was assigned longest ago.
    #[default]
    RoundRobin,
    /// Whoever has the fewest upcoming bookings.
    LeastBusy,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::LeastBusy => "least_busy",
        }
    }
}

impl FromStr for Algorithm {
    type Err = BookingError;

    /// Accepts both the display labels (`"Round Robin"`) and the snake-case
    /// tags (`"least_busy"`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "round_robin" => Ok(Algorithm::RoundRobin),
            "least_busy" => Ok(Algorithm::LeastBusy),
            _ => Err(BookingError::InvalidAlgorithm(format!("'{s}'"))),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.as_str().to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── AvailabilityRules ───────────────────────────────────────────────────────

/// Per-member booking rules layered over working hours.
///
/// A limit of `Some(0)` means unlimited, as in the stored rule records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityRules {
    pub buffer_before_minutes: u32,
    pub buffer_after_minutes: u32,
    pub max_per_day: Option<u32>,
    pub max_per_week: Option<u32>,
    pub min_notice_hours: u32,
    pub max_days_advance: Option<u32>,
    pub overrides: Vec<DateOverride>,
}

fn limit(value: Option<u32>) -> Option<u32> {
    value.filter(|&n| n > 0)
}

impl AvailabilityRules {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_before_minutes > MAX_BUFFER_MINUTES
            || self.buffer_after_minutes > MAX_BUFFER_MINUTES
        {
            return Err(BookingError::InvalidSchedule(format!(
                "buffer times cannot exceed {MAX_BUFFER_MINUTES} minutes"
            )));
        }
        if limit(self.max_per_day).is_some_and(|n| n > MAX_PER_DAY) {
            return Err(BookingError::InvalidSchedule(format!(
                "max bookings per day cannot exceed {MAX_PER_DAY}"
            )));
        }
        if limit(self.max_per_week).is_some_and(|n| n > MAX_PER_WEEK) {
            return Err(BookingError::InvalidSchedule(format!(
                "max bookings per week cannot exceed {MAX_PER_WEEK}"
            )));
        }
        if let (Some(day), Some(week)) = (limit(self.max_per_day), limit(self.max_per_week)) {
            if day > week {
                return Err(BookingError::InvalidSchedule(format!(
                    "max bookings per day ({day}) cannot exceed max bookings per week ({week})"
                )));
            }
        }
        if self.min_notice_hours > MAX_NOTICE_HOURS {
            return Err(BookingError::InvalidSchedule(format!(
                "minimum notice cannot exceed {MAX_NOTICE_HOURS} hours"
            )));
        }
        if let Some(days) = self.max_days_advance {
            if days == 0 || days > MAX_DAYS_ADVANCE {
                return Err(BookingError::InvalidSchedule(format!(
                    "max days in advance must be between 1 and {MAX_DAYS_ADVANCE}, got {days}"
                )));
            }
            if self.min_notice_hours >= days * 24 {
                return Err(BookingError::InvalidSchedule(format!(
                    "minimum notice ({} hours) must be shorter than the advance window ({days} days)",
                    self.min_notice_hours
                )));
            }
        }
        validate_overrides(&self.overrides)
    }

    /// Slot constraints for a member with these rules and the given calendar.
    ///
    /// The minimum-notice cut-off only applies when `now` is known.
    pub fn constraints<'a>(
        &self,
        bookings: &'a [Booking],
        busy: &'a [Interval],
        now: Option<DateTime<Utc>>,
    ) -> SlotConstraints<'a> {
        SlotConstraints {
            bookings,
            busy,
            buffer_before: Duration::minutes(i64::from(self.buffer_before_minutes)),
            buffer_after: Duration::minutes(i64::from(self.buffer_after_minutes)),
            max_per_day: limit(self.max_per_day),
            max_per_week: limit(self.max_per_week),
            not_before: now.map(|n| {
                n.checked_add_signed(Duration::hours(i64::from(self.min_notice_hours)))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }),
        }
    }
}

// ── Member ──────────────────────────────────────────────────────────────────

fn default_active() -> bool {
    true
}

fn default_priority() -> u8 {
    1
}

/// The scheduling-relevant projection of one department member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub zone: ZoneId,
    #[serde(default)]
    pub schedule: WeeklySchedule,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Assignment priority, 1..=10.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub last_assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_assignments: u32,
    #[serde(default)]
    pub rules: AvailabilityRules,
}

impl Member {
    /// An active member working business hours with no extra rules.
    pub fn new(id: impl Into<MemberId>, zone: ZoneId) -> Self {
        Self {
            id: id.into(),
            zone,
            schedule: WeeklySchedule::default(),
            active: true,
            priority: default_priority(),
            last_assigned_at: None,
            total_assignments: 0,
            rules: AvailabilityRules::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: WeeklySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_rules(mut self, rules: AvailabilityRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_last_assigned(mut self, at: DateTime<Utc>, total: u32) -> Self {
        self.last_assigned_at = Some(at);
        self.total_assignments = total;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

// ── Department ──────────────────────────────────────────────────────────────

/// A department snapshot: its zone, algorithm, and ordered roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub zone: ZoneId,
    #[serde(default)]
    pub algorithm: Algorithm,
    pub members: Vec<Member>,
    #[serde(default)]
    pub leader: Option<MemberId>,
}

impl Department {
    /// Parse and validate a department snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let department: Department = serde_json::from_str(json)
            .map_err(|e| BookingError::InvalidDepartment(e.to_string()))?;
        department.validate()?;
        Ok(department)
    }

    /// Check roster invariants.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidDepartment`] for an empty roster, duplicate
    ///   members, a priority outside 1..=10, no active member, or a leader
    ///   who is not an active member.
    /// - [`BookingError::InvalidSchedule`] if a member's rules are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(BookingError::InvalidDepartment(format!(
                "department '{}' must have at least one member",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(&member.id) {
                return Err(BookingError::InvalidDepartment(format!(
                    "member '{}' appears more than once in department '{}'",
                    member.id, self.id
                )));
            }
            if !(1..=10).contains(&member.priority) {
                return Err(BookingError::InvalidDepartment(format!(
                    "assignment priority for member '{}' must be between 1 and 10, got {}",
                    member.id, member.priority
                )));
            }
            member.rules.validate()?;
        }

        if !self.members.iter().any(|m| m.active) {
            return Err(BookingError::InvalidDepartment(format!(
                "department '{}' must have at least one active member",
                self.id
            )));
        }

        if let Some(leader) = &self.leader {
            match self.member(leader) {
                None => {
                    return Err(BookingError::InvalidDepartment(format!(
                        "leader '{leader}' must be a member of department '{}'",
                        self.id
                    )))
                }
                Some(m) if !m.active => {
                    return Err(BookingError::InvalidDepartment(format!(
                        "leader '{leader}' must be an active member"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.members.iter().find(|m| &m.id == id)
    }

    pub fn member_mut(&mut self, id: &MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.id == id)
    }

    pub fn active_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.active)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
