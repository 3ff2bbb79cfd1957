//! The engine's exposed calls, wired to a snapshot source.
//!
//! [`SnapshotSource`] is the collaborator that owns departments, bookings,
//! and busy calendars. Each call fetches what it needs once, computes over
//! that snapshot, and returns. Nothing is cached between calls.
//!
//! # Concurrency
//!
//! Computing availability is read-only and may run concurrently with
//! anything. Assignment is not: [`select_assignee`] reads a member's fairness
//! counters and returns the [`CounterUpdate`](crate::CounterUpdate) to write.
//! Callers must serialize assignments per department, either through a
//! single-writer queue or by persisting the update with a compare-and-swap
//! on the previous counter values
//! ([`CounterUpdate::apply`](crate::CounterUpdate::apply) does this against
//! an in-memory snapshot). On [`BookingError::AssignmentConflict`], reselect
//! from a fresh snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, NaiveTime, Utc};
use tracing::debug;

use crate::assignment::{self, least_busy_until, Assignment};
use crate::availability::{
    aggregate, member_available_for, AvailabilityResult, DateRange, MemberCalendar,
};
use crate::config::EngineConfig;
use crate::error::{BookingError, Result};
use crate::roster::{Algorithm, Department, Member, MemberId};
use crate::slots::{Booking, Interval, Slot};

/// Calendar slack fetched around a date range: a week covers both the widest
/// zone offsets and the ISO week used by weekly booking limits.
const FETCH_SLACK_DAYS: i64 = 8;

/// Read access to the data the engine computes over.
///
/// Implementations should report fetch failures as
/// [`BookingError::SnapshotUnavailable`] so callers know to retry.
pub trait SnapshotSource {
    fn department(&self, id: &str) -> Result<Department>;

    /// Bookings for `member` overlapping `window`.
    fn bookings(&self, member: &MemberId, window: &Interval) -> Result<Vec<Booking>>;

    /// External busy blocks for `member` overlapping `window`.
    fn busy_blocks(&self, member: &MemberId, window: &Interval) -> Result<Vec<Interval>>;
}

fn fetch_window(range: &DateRange) -> Result<Interval> {
    let slack = FETCH_SLACK_DAYS.unsigned_abs();
    match (
        range.start.checked_sub_days(Days::new(slack)),
        range.end.checked_add_days(Days::new(slack + 1)),
    ) {
        (Some(start), Some(end)) => Interval::new(
            start.and_time(NaiveTime::default()).and_utc(),
            end.and_time(NaiveTime::default()).and_utc(),
        ),
        _ => Err(BookingError::InvalidDateRange(format!(
            "{} .. {} is too close to the calendar limits",
            range.start, range.end
        ))),
    }
}

/// Offered slots for a department over `range` (department-local dates).
///
/// # Errors
///
/// Validation errors for the range, department, or slot length, and
/// whatever the source reports for failed fetches.
pub fn compute_availability<S: SnapshotSource + ?Sized>(
    source: &S,
    department_id: &str,
    range: DateRange,
    slot_len: Duration,
    config: &EngineConfig,
    now: Option<DateTime<Utc>>,
) -> Result<AvailabilityResult> {
    range.check(config.max_range_days)?;
    let department = source.department(department_id)?;
    let window = fetch_window(&range)?;

    let mut calendars = HashMap::new();
    for member in department.active_members() {
        let calendar = MemberCalendar {
            bookings: source.bookings(&member.id, &window)?,
            busy: source.busy_blocks(&member.id, &window)?,
        };
        calendars.insert(member.id.clone(), calendar);
    }

    let result = aggregate(&department, &calendars, range, slot_len, config, now)?;
    debug!(
        department = %department.id,
        start = %range.start,
        end = %range.end,
        members = calendars.len(),
        slots = result.slots.len(),
        "Computed department availability"
    );
    Ok(result)
}

/// Choose the member who takes `slot` among `eligible`.
///
/// With `config.verify_eligibility` set, each eligible member is re-checked
/// against a fresh calendar fetch first, so a stale eligible list cannot
/// assign a member who has since been booked. The returned [`Assignment`]
/// carries the counter update; persisting it is the caller's job (see the
/// module docs).
///
/// # Errors
///
/// [`BookingError::NoEligibleMember`] if no eligible id is an active,
/// available member, plus validation and fetch errors.
pub fn select_assignee<S: SnapshotSource + ?Sized>(
    source: &S,
    department_id: &str,
    slot: &Slot,
    eligible: &[MemberId],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Assignment> {
    assign(source, department_id, slot, eligible, now, config, None)
}

/// [`select_assignee`] for moving `rescheduled` to `slot`.
///
/// The booking being moved is ignored when verifying eligibility, so its
/// current holder can keep it if they are free at the new time.
///
/// # Errors
///
/// As [`select_assignee`].
pub fn reselect_assignee<S: SnapshotSource + ?Sized>(
    source: &S,
    department_id: &str,
    slot: &Slot,
    eligible: &[MemberId],
    rescheduled: &Booking,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Assignment> {
    assign(source, department_id, slot, eligible, now, config, Some(rescheduled))
}

/// Calendar window fetched to verify one slot.
fn slot_window(slot: &Slot) -> Result<Interval> {
    let slack = Duration::days(FETCH_SLACK_DAYS);
    match (
        slot.start.checked_sub_signed(slack),
        slot.end.checked_add_signed(slack),
    ) {
        (Some(start), Some(end)) => Interval::new(start, end),
        _ => Err(BookingError::InvalidDuration(format!(
            "slot {} .. {} is too close to the representable range",
            slot.start, slot.end
        ))),
    }
}

fn assign<S: SnapshotSource + ?Sized>(
    source: &S,
    department_id: &str,
    slot: &Slot,
    eligible: &[MemberId],
    now: DateTime<Utc>,
    config: &EngineConfig,
    rescheduled: Option<&Booking>,
) -> Result<Assignment> {
    let department = source.department(department_id)?;
    department.validate()?;

    let candidates: Vec<&Member> = department
        .active_members()
        .filter(|m| eligible.contains(&m.id))
        .collect();

    let mut verified = Vec::with_capacity(candidates.len());
    if config.verify_eligibility {
        let window = slot_window(slot)?;
        for member in &candidates {
            let calendar = MemberCalendar {
                bookings: source.bookings(&member.id, &window)?,
                busy: source.busy_blocks(&member.id, &window)?,
            };
            match member_available_for(member, &calendar, slot, config, Some(now), rescheduled)? {
                None => verified.push(member.id.clone()),
                Some(reason) => debug!(
                    department = %department.id,
                    member = %member.id,
                    reason = ?reason,
                    "Dropped member no longer available for slot"
                ),
            }
        }
    } else {
        verified.extend(candidates.iter().map(|m| m.id.clone()));
    }

    let mut bookings = Vec::new();
    if department.algorithm == Algorithm::LeastBusy {
        let window = Interval::new(now, least_busy_until(now, config)?)?;
        for id in &verified {
            bookings.extend(source.bookings(id, &window)?);
        }
    }

    match assignment::select_assignee(&department, slot, &verified, &bookings, now, config) {
        Ok(assignment) => {
            debug!(
                department = %department.id,
                member = %assignment.member,
                algorithm = %assignment.algorithm,
                slot_start = %slot.start,
                "Selected assignee"
            );
            Ok(assignment)
        }
        Err(err @ BookingError::NoEligibleMember) => {
            debug!(
                department = %department.id,
                eligible = eligible.len(),
                verified = verified.len(),
                "No eligible member for slot"
            );
            Err(err)
        }
        Err(err) => Err(err),
    }
}
