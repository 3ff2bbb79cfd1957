//! DST-aware, UTC-canonical timezone conversion.
//!
//! Every other module works in UTC. This module is the only place where a
//! wall-clock time crosses into or out of canonical UTC, so all
//! daylight-saving handling lives here.
//!
//! Converting UTC to local time is total. Converting local time to UTC is
//! not: a fall-back transition repeats an hour (ambiguous) and a
//! spring-forward transition skips one (nonexistent). Both cases are
//! reported as errors unless the caller states how to resolve them. We
//! never guess.
//!
//! # Functions
//!
//! - [`to_zone`] — UTC instant → local wall-clock time
//! - [`to_utc`] — local wall-clock time → UTC instant (may fail)
//! - [`offset_at`] — UTC offset of a zone at an instant
//! - [`is_transition_boundary`] — whether a local time is ambiguous or nonexistent
//! - [`gap_end`] — first existing local time after a spring-forward gap
//! - [`localize`] — [`to_utc`] with an explicit fall-back/gap policy pair

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::{OffsetComponents, Tz};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};

/// Upper bound on how far [`gap_end`] searches. The largest gap on record is
/// a whole skipped day (Pacific/Apia, December 2011).
const MAX_GAP_MINUTES: i64 = 48 * 60;

// ── ZoneId ──────────────────────────────────────────────────────────────────

/// A validated IANA timezone identifier (e.g. `"Europe/Copenhagen"`).
///
/// Fixed offsets and abbreviations such as `"CET"` or `"+01:00"` are not
/// accepted as zone *identifiers* by callers of this crate, because offsets
/// change with DST and abbreviations are ambiguous. Anything the IANA
/// database knows by name is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneId(Tz);

impl ZoneId {
    /// Coordinated Universal Time.
    pub const UTC: ZoneId = ZoneId(Tz::UTC);

    /// Parse an IANA timezone name.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidZone`] if the name is not in the IANA database.
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Tz>()
            .map(ZoneId)
            .map_err(|_| BookingError::InvalidZone(format!("'{name}'")))
    }

    /// The IANA name of this zone.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// The underlying `chrono-tz` zone.
    pub fn tz(&self) -> Tz {
        self.0
    }
}

impl FromStr for ZoneId {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        ZoneId::parse(s)
    }
}

impl TryFrom<String> for ZoneId {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self> {
        ZoneId::parse(&value)
    }
}

impl From<ZoneId> for String {
    fn from(zone: ZoneId) -> Self {
        zone.name().to_string()
    }
}

impl From<Tz> for ZoneId {
    fn from(tz: Tz) -> Self {
        ZoneId(tz)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Policies ────────────────────────────────────────────────────────────────

/// Which of two valid instants to pick for a repeated (fall-back) local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disambiguation {
    /// The first occurrence (still on the pre-transition offset).
    #[default]
    Earlier,
    /// The second occurrence (already on the post-transition offset).
    Later,
}

/// What to do with a local time that a spring-forward transition skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Move the time forward to the first local time after the gap.
    #[default]
    ClampForward,
    /// Surface [`BookingError::DstNonexistent`].
    Reject,
}

// ── UtcOffset ───────────────────────────────────────────────────────────────

/// A signed offset from UTC in whole minutes. Displays as `+HH:MM` / `-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtcOffset {
    pub minutes: i32,
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minutes >= 0 { "+" } else { "-" };
        let abs = self.minutes.unsigned_abs();
        write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
    }
}

// ── Conversions ─────────────────────────────────────────────────────────────

/// Express a UTC instant as wall-clock time in `zone`.
///
/// # Examples
///
/// ```
/// use booking_engine::timezone::{to_zone, ZoneId};
/// use chrono::{TimeZone, Utc};
///
/// let zone = ZoneId::parse("America/New_York").unwrap();
/// let instant = Utc.with_ymd_and_hms(2026, 3, 15, 14, 0, 0).unwrap();
/// // March 15 2026 is EDT (UTC-4)
/// assert_eq!(to_zone(instant, zone).to_string(), "2026-03-15 10:00:00");
/// ```
pub fn to_zone(instant: DateTime<Utc>, zone: ZoneId) -> NaiveDateTime {
    instant.with_timezone(&zone.tz()).naive_local()
}

/// The calendar date an instant falls on in `zone`.
pub fn local_date(instant: DateTime<Utc>, zone: ZoneId) -> NaiveDate {
    to_zone(instant, zone).date()
}

/// Convert a wall-clock time in `zone` to a UTC instant.
///
/// # Errors
///
/// - [`BookingError::DstAmbiguous`] if `local` occurs twice and no
///   `disambiguation` was given.
/// - [`BookingError::DstNonexistent`] if `local` was skipped by a
///   spring-forward transition. The caller may retry with [`gap_end`].
pub fn to_utc(
    local: NaiveDateTime,
    zone: ZoneId,
    disambiguation: Option<Disambiguation>,
) -> Result<DateTime<Utc>> {
    match zone.tz().from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(a, b) => {
            let (a, b) = (a.with_timezone(&Utc), b.with_timezone(&Utc));
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
            match disambiguation {
                Some(Disambiguation::Earlier) => Ok(earlier),
                Some(Disambiguation::Later) => Ok(later),
                None => Err(BookingError::DstAmbiguous {
                    local,
                    zone: zone.name().to_string(),
                }),
            }
        }
        LocalResult::None => Err(BookingError::DstNonexistent {
            local,
            zone: zone.name().to_string(),
        }),
    }
}

/// The UTC offset in effect in `zone` at `instant`. Display use only.
pub fn offset_at(instant: DateTime<Utc>, zone: ZoneId) -> UtcOffset {
    let seconds = zone
        .tz()
        .offset_from_utc_datetime(&instant.naive_utc())
        .fix()
        .local_minus_utc();
    UtcOffset {
        minutes: seconds / 60,
    }
}

/// Whether daylight saving time is in effect in `zone` at `instant`.
pub fn is_dst_active(instant: DateTime<Utc>, zone: ZoneId) -> bool {
    zone.tz()
        .offset_from_utc_datetime(&instant.naive_utc())
        .dst_offset()
        != Duration::zero()
}

/// True if [`to_utc`] would be ambiguous or fail for this local time.
pub fn is_transition_boundary(local: NaiveDateTime, zone: ZoneId) -> bool {
    !matches!(zone.tz().from_local_datetime(&local), LocalResult::Single(_))
}

/// The first local time at or after `local` that exists in `zone`.
///
/// Returns `local` unchanged when it exists. Inside a spring-forward gap the
/// result is the wall-clock time the clocks jumped to (e.g. 03:00 for a
/// 02:00→03:00 transition).
///
/// # Errors
///
/// Returns [`BookingError::DstNonexistent`] if no existing local time is found
/// within two days, which no real zone produces.
pub fn gap_end(local: NaiveDateTime, zone: ZoneId) -> Result<NaiveDateTime> {
    let tz = zone.tz();
    if !matches!(tz.from_local_datetime(&local), LocalResult::None) {
        return Ok(local);
    }

    // Transitions happen on whole minutes.
    let base = local
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local);
    (1..=MAX_GAP_MINUTES)
        .filter_map(|m| base.checked_add_signed(Duration::minutes(m)))
        .find(|candidate| !matches!(tz.from_local_datetime(candidate), LocalResult::None))
        .ok_or_else(|| BookingError::DstNonexistent {
            local,
            zone: zone.name().to_string(),
        })
}

/// Convert local time to UTC applying a fixed policy for both kinds of DST
/// transition.
///
/// Used where the engine, not a human, picks the boundary of a working
/// interval; see [`crate::config::EngineConfig`].
pub fn localize(
    local: NaiveDateTime,
    zone: ZoneId,
    ambiguity: Disambiguation,
    gap: GapPolicy,
) -> Result<DateTime<Utc>> {
    match to_utc(local, zone, Some(ambiguity)) {
        Err(BookingError::DstNonexistent { .. }) if gap == GapPolicy::ClampForward => {
            let shifted = gap_end(local, zone)?;
            to_utc(shifted, zone, Some(ambiguity))
        }
        other => other,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
