//! Fair assignment of a booked slot to one department member.
//!
//! Selection is a pure function of the department snapshot: it never writes
//! the fairness counters back. The returned [`CounterUpdate`] describes the
//! write, and [`CounterUpdate::apply`] performs it against a snapshot with a
//! compare-and-swap check so a caller can detect a lost race.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{BookingError, Result};
use crate::roster::{Algorithm, Department, Member, MemberId};
use crate::slots::{Booking, BookingStatus, Slot};

/// The counter write that records an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterUpdate {
    pub member: MemberId,
    /// Counters as they were read at selection time.
    pub previous_last_assigned_at: Option<DateTime<Utc>>,
    pub previous_total: u32,
    pub last_assigned_at: DateTime<Utc>,
    pub total_assignments: u32,
}

impl CounterUpdate {
    fn for_member(member: &Member, now: DateTime<Utc>) -> Self {
        Self {
            member: member.id.clone(),
            previous_last_assigned_at: member.last_assigned_at,
            previous_total: member.total_assignments,
            last_assigned_at: now,
            total_assignments: member.total_assignments.saturating_add(1),
        }
    }

    /// Write the new counters into `department`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::AssignmentConflict`] if the member is gone or
    /// inactive, or if their counters changed since selection read them. The
    /// snapshot is left untouched in that case.
    pub fn apply(&self, department: &mut Department) -> Result<()> {
        let member = department.member_mut(&self.member).ok_or_else(|| {
            BookingError::AssignmentConflict(format!(
                "member '{}' is no longer in the department",
                self.member
            ))
        })?;
        if !member.active {
            return Err(BookingError::AssignmentConflict(format!(
                "member '{}' was deactivated",
                self.member
            )));
        }
        if member.last_assigned_at != self.previous_last_assigned_at
            || member.total_assignments != self.previous_total
        {
            return Err(BookingError::AssignmentConflict(format!(
                "counters for '{}' changed since selection",
                self.member
            )));
        }
        member.last_assigned_at = Some(self.last_assigned_at);
        member.total_assignments = self.total_assignments;
        Ok(())
    }
}

/// The outcome of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub slot: Slot,
    pub member: MemberId,
    pub algorithm: Algorithm,
    pub update: CounterUpdate,
}

// ── Selection ───────────────────────────────────────────────────────────────

/// End of the Least Busy look-ahead window starting at `now`.
pub(crate) fn least_busy_until(now: DateTime<Utc>, config: &EngineConfig) -> Result<DateTime<Utc>> {
    now.checked_add_signed(Duration::days(i64::from(config.least_busy_window_days)))
        .ok_or_else(|| {
            BookingError::InvalidDuration(format!(
                "least busy window of {} days overflows from {now}",
                config.least_busy_window_days
            ))
        })
}

/// Round Robin order: never-assigned first, then oldest assignment, then id.
fn round_robin_order(a: &Member, b: &Member) -> Ordering {
    a.last_assigned_at
        .cmp(&b.last_assigned_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Bookings per member with a start in `[from, until)` that pass `counts`.
fn load_between(
    bookings: &[Booking],
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    counts: impl Fn(&Booking) -> bool,
) -> HashMap<&MemberId, usize> {
    let mut load = HashMap::new();
    for booking in bookings
        .iter()
        .filter(|b| counts(*b) && b.start >= from && b.start < until)
    {
        *load.entry(&booking.member).or_insert(0) += 1;
    }
    load
}

/// Pick exactly one member from `eligible` for `slot`.
///
/// `eligible` usually comes from the availability result for the slot; ids
/// not in the department's active roster are ignored. `bookings` is only
/// read by [`Algorithm::LeastBusy`].
///
/// # Errors
///
/// Returns [`BookingError::NoEligibleMember`] if no eligible id names an
/// active member, and [`BookingError::InvalidDuration`] if the Least Busy
/// window runs past the representable date range.
pub fn select_assignee(
    department: &Department,
    slot: &Slot,
    eligible: &[MemberId],
    bookings: &[Booking],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Assignment> {
    let candidates: Vec<&Member> = department
        .active_members()
        .filter(|m| eligible.contains(&m.id))
        .collect();

    let chosen = match department.algorithm {
        Algorithm::RoundRobin => candidates
            .iter()
            .copied()
            .min_by(|a, b| round_robin_order(a, b)),
        Algorithm::LeastBusy => {
            let until = least_busy_until(now, config)?;
            let load = load_between(bookings, now, until, Booking::blocks_time);
            let count = |m: &Member| load.get(&m.id).copied().unwrap_or(0);
            candidates
                .iter()
                .copied()
                .min_by(|a, b| count(a).cmp(&count(b)).then_with(|| round_robin_order(a, b)))
        }
    }
    .ok_or(BookingError::NoEligibleMember)?;

    Ok(Assignment {
        slot: *slot,
        member: chosen.id.clone(),
        algorithm: department.algorithm,
        update: CounterUpdate::for_member(chosen, now),
    })
}

// ── Workload ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Balance {
    Balanced,
    Imbalanced,
}

/// One member's line in a [`WorkloadReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemberLoad {
    /// Pending, confirmed, and completed bookings since the report start.
    pub recent: usize,
    pub total_assignments: u32,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

/// Recent assignment load across a department's active members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadReport {
    pub counts: BTreeMap<MemberId, MemberLoad>,
    pub average: f64,
    pub overloaded: Vec<MemberId>,
    pub underloaded: Vec<MemberId>,
    pub status: Balance,
}

/// Count bookings since `since` per active member and flag members deviating
/// from the average by more than `config.rebalance_threshold`.
///
/// Completed bookings count as workload here even though they no longer
/// block time.
pub fn workload_report(
    department: &Department,
    bookings: &[Booking],
    since: DateTime<Utc>,
    config: &EngineConfig,
) -> WorkloadReport {
    let load = load_between(bookings, since, DateTime::<Utc>::MAX_UTC, |b| {
        b.blocks_time() || b.status == BookingStatus::Completed
    });
    let counts: BTreeMap<MemberId, MemberLoad> = department
        .active_members()
        .map(|m| {
            let line = MemberLoad {
                recent: load.get(&m.id).copied().unwrap_or(0),
                total_assignments: m.total_assignments,
                last_assigned_at: m.last_assigned_at,
            };
            (m.id.clone(), line)
        })
        .collect();

    let average = if counts.is_empty() {
        0.0
    } else {
        counts.values().map(|l| l.recent).sum::<usize>() as f64 / counts.len() as f64
    };

    let mut overloaded = Vec::new();
    let mut underloaded = Vec::new();
    if average > 0.0 {
        let high = average * (1.0 + config.rebalance_threshold);
        let low = average * (1.0 - config.rebalance_threshold);
        for (id, line) in &counts {
            let count = line.recent as f64;
            if count > high {
                overloaded.push(id.clone());
            } else if count < low {
                underloaded.push(id.clone());
            }
        }
    }

    let status = if overloaded.is_empty() && underloaded.is_empty() {
        Balance::Balanced
    } else {
        Balance::Imbalanced
    };

    WorkloadReport {
        counts,
        average,
        overloaded,
        underloaded,
        status,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
