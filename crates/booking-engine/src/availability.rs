//! Department-level availability.
//!
//! Runs the slot generator for every active member over a date range and
//! merges the results into one chronological list. A slot is offered if at
//! least one member can take it; each slot carries the set of members who
//! could.
//!
//! The date range is interpreted in the department's zone. Members may live
//! in other zones, so each member's own local dates are scanned with
//! [`SCAN_SLACK_DAYS`] of slack on both sides and the merged slots are
//! clipped back to the department-local range.
//!
//! [`member_available_for`] answers the narrower question of whether one
//! member can take one exact slot, and why not.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{BookingError, Result};
use crate::roster::{Department, Member, MemberId};
use crate::schedule::resolve_with_overrides;
use crate::slots::{generate, Booking, Interval, Slot, Unavailable};
use crate::timezone::{local_date, localize, ZoneId};

/// Local dates scanned on each side of a department range. UTC offsets span
/// UTC-12 to UTC+14, so a member's date can sit up to two dates away from
/// the department's.
pub const SCAN_SLACK_DAYS: u64 = 2;

// ── DateRange ───────────────────────────────────────────────────────────────

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDateRange`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(BookingError::InvalidDateRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Number of dates in the range.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// The range widened by `days` dates on each side, saturating at the
    /// calendar limits.
    fn widened(&self, days: u64) -> Self {
        Self {
            start: self.start.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN),
            end: self.end.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX),
        }
    }

    pub(crate) fn check(&self, max_days: u32) -> Result<()> {
        if self.start > self.end {
            return Err(BookingError::InvalidDateRange(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.len_days() > i64::from(max_days) {
            return Err(BookingError::InvalidDateRange(format!(
                "range spans {} days, the limit is {max_days}",
                self.len_days()
            )));
        }
        Ok(())
    }
}

// ── Results ─────────────────────────────────────────────────────────────────

/// A member's existing commitments, as fetched from collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCalendar {
    pub bookings: Vec<Booking>,
    pub busy: Vec<Interval>,
}

/// One offered slot and the members who could take it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableSlot {
    pub slot: Slot,
    pub members: BTreeSet<MemberId>,
}

/// Department availability over a date range, ordered by slot start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityResult {
    pub department: String,
    pub zone: ZoneId,
    pub range: DateRange,
    pub slots: Vec<AvailableSlot>,
}

impl AvailabilityResult {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Members eligible for exactly this slot, if it is offered.
    pub fn eligible_for(&self, slot: &Slot) -> Option<&BTreeSet<MemberId>> {
        self.slots
            .binary_search_by(|s| s.slot.cmp(slot))
            .ok()
            .map(|i| &self.slots[i].members)
    }

    /// Department-local dates with at least one offered slot.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .slots
            .iter()
            .map(|s| local_date(s.slot.start, self.zone))
            .collect();
        dates.dedup();
        dates
    }
}

// ── Aggregation ─────────────────────────────────────────────────────────────

/// Last member-local date inside the advance-booking window.
fn last_bookable(member: &Member, now: Option<DateTime<Utc>>) -> Option<NaiveDate> {
    now.zip(member.rules.max_days_advance).and_then(|(now, days)| {
        local_date(now, member.zone).checked_add_days(Days::new(u64::from(days)))
    })
}

/// Free slots for one member over their own local dates in `range`.
///
/// When `now` is given, the member's minimum notice and advance-booking
/// window apply; otherwise only working hours and conflicts do.
pub fn member_slots(
    member: &Member,
    calendar: &MemberCalendar,
    range: DateRange,
    slot_len: Duration,
    config: &EngineConfig,
    now: Option<DateTime<Utc>>,
) -> Result<Vec<Slot>> {
    let rules = &member.rules;
    let constraints = rules.constraints(&calendar.bookings, &calendar.busy, now);
    let last_bookable = last_bookable(member, now);

    let mut slots = Vec::new();
    for date in range.days() {
        if last_bookable.is_some_and(|last| date > last) {
            break;
        }
        let Some(interval) =
            resolve_with_overrides(&member.schedule, &rules.overrides, date, member.zone)?
        else {
            continue;
        };
        slots.extend(generate(&interval, slot_len, &constraints, config)?);
    }
    Ok(slots)
}

/// Merge all active members' free slots into department availability.
///
/// `calendars` maps member ids to their bookings and busy blocks; a member
/// without an entry has an empty calendar.
///
/// # Errors
///
/// - [`BookingError::InvalidDepartment`] / [`BookingError::InvalidSchedule`]
///   if the snapshot fails validation.
/// - [`BookingError::InvalidDateRange`] if the range is inverted or longer
///   than `config.max_range_days`.
/// - Any slot generation error for a member.
pub fn aggregate(
    department: &Department,
    calendars: &HashMap<MemberId, MemberCalendar>,
    range: DateRange,
    slot_len: Duration,
    config: &EngineConfig,
    now: Option<DateTime<Utc>>,
) -> Result<AvailabilityResult> {
    department.validate()?;
    range.check(config.max_range_days)?;

    let empty = MemberCalendar::default();
    let scan = range.widened(SCAN_SLACK_DAYS);
    let mut merged: BTreeMap<Slot, BTreeSet<MemberId>> = BTreeMap::new();

    for member in department.active_members() {
        let calendar = calendars.get(&member.id).unwrap_or(&empty);
        for slot in member_slots(member, calendar, scan, slot_len, config, now)? {
            if range.contains(local_date(slot.start, department.zone)) {
                merged.entry(slot).or_default().insert(member.id.clone());
            }
        }
    }

    Ok(AvailabilityResult {
        department: department.id.clone(),
        zone: department.zone,
        range,
        slots: merged
            .into_iter()
            .map(|(slot, members)| AvailableSlot { slot, members })
            .collect(),
    })
}

// ── Single slot ─────────────────────────────────────────────────────────────

/// Check whether `member` can take exactly `slot`.
///
/// Returns `Ok(None)` when the member is free, otherwise the first reason
/// found: inactive, advance window, working hours and date overrides, then
/// bookings, busy blocks, buffers, notice, and limits. `exclude` drops one
/// booking from the calendar, which is how a booking being rescheduled stops
/// conflicting with itself.
///
/// # Errors
///
/// Schedule resolution or DST errors for the member's working interval.
pub fn member_available_for(
    member: &Member,
    calendar: &MemberCalendar,
    slot: &Slot,
    config: &EngineConfig,
    now: Option<DateTime<Utc>>,
    exclude: Option<&Booking>,
) -> Result<Option<Unavailable>> {
    if !member.active {
        return Ok(Some(Unavailable::Inactive));
    }
    let rules = &member.rules;
    let date = local_date(slot.start, member.zone);
    if last_bookable(member, now).is_some_and(|last| date > last) {
        return Ok(Some(Unavailable::TooFarAhead));
    }

    let Some(interval) =
        resolve_with_overrides(&member.schedule, &rules.overrides, date, member.zone)?
    else {
        return Ok(Some(Unavailable::OutsideWorkingHours));
    };
    let open = localize(interval.start, interval.zone, config.ambiguity, config.gap)?;
    let close = localize(interval.end, interval.zone, config.ambiguity, config.gap)?;
    if slot.start < open || slot.end > close {
        return Ok(Some(Unavailable::OutsideWorkingHours));
    }

    let bookings: Vec<Booking> = calendar
        .bookings
        .iter()
        .filter(|b| exclude != Some(*b))
        .cloned()
        .collect();
    let constraints = rules.constraints(&bookings, &calendar.busy, now);
    if let Some(reason) = constraints.rejection(slot) {
        return Ok(Some(reason));
    }
    if constraints.limit_reached(member.zone, date) {
        return Ok(Some(Unavailable::LimitReached));
    }
    Ok(None)
}

// ── Tests ───────────────────────────────────────────────────────────────────
