//! Slot generation for one member on one date.
//!
//! A resolved working interval is converted to UTC once, partitioned into
//! fixed-length slots, and filtered against everything that makes a slot
//! unbookable: existing bookings, external calendar busy blocks, buffer
//! rules, booking limits, and the minimum-notice cut-off.
//!
//! All intervals are half-open `[start, end)`. Two intervals overlap iff
//! `a.start < b.end && b.start < a.end`, so back-to-back slots never
//! conflict with each other.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{BookingError, Result};
use crate::roster::MemberId;
use crate::schedule::LocalInterval;
use crate::timezone::{local_date, localize, ZoneId};

fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

// ── Slot / Interval ─────────────────────────────────────────────────────────

/// A bookable, fixed-length UTC interval `[start, end)`.
///
/// Ordering is by start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDuration`] unless `end > start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(BookingError::InvalidDuration(format!(
                "slot must end after it starts ({start} .. {end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        overlaps(self.start, self.end, start, end)
    }
}

/// A busy block from an external calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDuration`] unless `end > start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(BookingError::InvalidDuration(format!(
                "busy block must end after it starts ({start} .. {end})"
            )));
        }
        Ok(Self { start, end })
    }
}

// ── Booking ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    #[default]
    Confirmed,
    Cancelled,
    Completed,
}

/// An existing booking. Read-only here: a conflict source and a load signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub member: MemberId,
    #[serde(default)]
    pub status: BookingStatus,
}

impl Booking {
    pub fn confirmed(member: impl Into<MemberId>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            member: member.into(),
            status: BookingStatus::Confirmed,
        }
    }

    /// Pending and confirmed bookings hold the member's time and count toward
    /// limits; cancelled and completed ones do not.
    pub fn blocks_time(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

// ── Constraints ─────────────────────────────────────────────────────────────

/// Why a member cannot take a particular slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    Inactive,
    OutsideWorkingHours,
    /// Inside the minimum-notice period.
    TooSoon,
    /// Beyond the advance-booking window.
    TooFarAhead,
    Booked,
    /// Collides with another commitment's buffer only.
    Buffer,
    Busy,
    /// Daily or weekly booking limit reached.
    LimitReached,
}

/// Everything besides working hours that can rule a slot out.
#[derive(Debug, Clone, Copy)]
pub struct SlotConstraints<'a> {
    /// The member's existing bookings.
    pub bookings: &'a [Booking],
    /// The member's external calendar busy blocks.
    pub busy: &'a [Interval],
    /// Free time required before a slot.
    pub buffer_before: Duration,
    /// Free time required after a slot.
    pub buffer_after: Duration,
    /// Maximum bookings per local date; reaching it closes the whole date.
    pub max_per_day: Option<u32>,
    /// Maximum bookings per local ISO week (Monday–Sunday).
    pub max_per_week: Option<u32>,
    /// Slots starting before this instant are not offered (minimum notice).
    pub not_before: Option<DateTime<Utc>>,
}

impl Default for SlotConstraints<'_> {
    fn default() -> Self {
        Self {
            bookings: &[],
            busy: &[],
            buffer_before: Duration::zero(),
            buffer_after: Duration::zero(),
            max_per_day: None,
            max_per_week: None,
            not_before: None,
        }
    }
}

impl SlotConstraints<'_> {
    /// The first reason `slot` is ruled out, if any.
    pub(crate) fn rejection(&self, slot: &Slot) -> Option<Unavailable> {
        if self.not_before.is_some_and(|cutoff| slot.start < cutoff) {
            return Some(Unavailable::TooSoon);
        }
        let blocking = || self.bookings.iter().filter(|b| b.blocks_time());
        if blocking().any(|b| slot.overlaps(b.start, b.end)) {
            return Some(Unavailable::Booked);
        }
        if self.busy.iter().any(|i| slot.overlaps(i.start, i.end)) {
            return Some(Unavailable::Busy);
        }

        let padded_start = slot
            .start
            .checked_sub_signed(self.buffer_before)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let padded_end = slot
            .end
            .checked_add_signed(self.buffer_after)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let padded_conflict = blocking().any(|b| overlaps(padded_start, padded_end, b.start, b.end))
            || self
                .busy
                .iter()
                .any(|i| overlaps(padded_start, padded_end, i.start, i.end));
        padded_conflict.then_some(Unavailable::Buffer)
    }

    fn admits(&self, slot: &Slot) -> bool {
        self.rejection(slot).is_none()
    }

    fn count_between(&self, zone: ZoneId, first: NaiveDate, last: NaiveDate) -> usize {
        self.bookings
            .iter()
            .filter(|b| b.blocks_time())
            .filter(|b| {
                let day = local_date(b.start, zone);
                first <= day && day <= last
            })
            .count()
    }

    /// Whether the daily or weekly booking limit is already reached on `date`.
    pub(crate) fn limit_reached(&self, zone: ZoneId, date: NaiveDate) -> bool {
        let daily = self
            .max_per_day
            .is_some_and(|max| self.count_between(zone, date, date) >= max as usize);
        let weekly = self.max_per_week.is_some_and(|max| {
            let into_week = Days::new(u64::from(date.weekday().num_days_from_monday()));
            let monday = date.checked_sub_days(into_week).unwrap_or(NaiveDate::MIN);
            let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
            self.count_between(zone, monday, sunday) >= max as usize
        });
        daily || weekly
    }
}

// ── Generation ──────────────────────────────────────────────────────────────

/// Lazy, chronological sequence of free slots.
///
/// The sequence is deterministic: [`SlotIter::rewind`] restarts it from the
/// first slot, and a clone taken before iterating replays it.
#[derive(Debug, Clone)]
pub struct SlotIter<'a> {
    first: DateTime<Utc>,
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    slot_len: Duration,
    constraints: SlotConstraints<'a>,
    closed: bool,
}

impl SlotIter<'_> {
    /// Start over from the first slot.
    pub fn rewind(&mut self) {
        self.cursor = self.first;
    }
}

impl Iterator for SlotIter<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.closed {
            return None;
        }
        loop {
            let slot_end = self.cursor.checked_add_signed(self.slot_len)?;
            // The trailing partial slot is never offered.
            if slot_end > self.end {
                return None;
            }
            let slot = Slot {
                start: self.cursor,
                end: slot_end,
            };
            self.cursor = slot_end;
            if self.constraints.admits(&slot) {
                return Some(slot);
            }
        }
    }
}

/// Produce the free slots for one member's working interval.
///
/// Interval boundaries are localized with the configured fall-back policy
/// (default: earlier occurrence) and spring-forward policy (default: clamp
/// forward past the gap).
///
/// # Errors
///
/// - [`BookingError::InvalidDuration`] if `slot_len` is not positive or a
///   buffer is negative.
/// - [`BookingError::DstNonexistent`] if a boundary falls into a gap and the
///   gap policy is [`GapPolicy::Reject`](crate::timezone::GapPolicy::Reject).
pub fn generate<'a>(
    interval: &LocalInterval,
    slot_len: Duration,
    constraints: &SlotConstraints<'a>,
    config: &EngineConfig,
) -> Result<SlotIter<'a>> {
    if slot_len <= Duration::zero() {
        return Err(BookingError::InvalidDuration(format!(
            "slot length must be positive, got {} minutes",
            slot_len.num_minutes()
        )));
    }
    if constraints.buffer_before < Duration::zero() || constraints.buffer_after < Duration::zero() {
        return Err(BookingError::InvalidDuration(
            "buffers cannot be negative".to_string(),
        ));
    }

    let zone = interval.zone;
    let start = localize(interval.start, zone, config.ambiguity, config.gap)?;
    let end = localize(interval.end, zone, config.ambiguity, config.gap)?;

    Ok(SlotIter {
        first: start,
        cursor: start,
        end,
        slot_len,
        constraints: *constraints,
        closed: constraints.limit_reached(zone, interval.date()),
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
