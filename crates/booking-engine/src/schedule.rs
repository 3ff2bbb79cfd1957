//! Weekly working hours and their resolution to a concrete date.
//!
//! A [`WeeklySchedule`] is validated once, when it enters the engine, and is
//! then trusted. [`resolve`] still re-checks the interval it produces since
//! schedules can be assembled by hand rather than parsed.
//!
//! Resolution stays in local time: "09:00–17:00" is combined with the date
//! as wall-clock time and only converted to UTC by the slot generator, once
//! slot boundaries are known.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::timezone::ZoneId;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

// ── DaySchedule ─────────────────────────────────────────────────────────────

/// Working hours for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub enabled: bool,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveTime>,
}

impl DaySchedule {
    /// An enabled day from `start` to `end`.
    pub fn open(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start: Some(start),
            end: Some(end),
        }
    }

    /// A day off.
    pub fn closed() -> Self {
        Self {
            enabled: false,
            start: None,
            end: None,
        }
    }

    fn validate(&self, day: Weekday) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = weekday_name(day);
        match (self.start, self.end) {
            (Some(start), Some(end)) if end > start => Ok(()),
            (Some(_), Some(_)) => Err(BookingError::InvalidSchedule(format!(
                "end time must be after start time for '{name}'"
            ))),
            _ => Err(BookingError::InvalidSchedule(format!(
                "'{name}' is enabled but missing 'start' or 'end' time"
            ))),
        }
    }
}

// ── WeeklySchedule ──────────────────────────────────────────────────────────

/// Working hours for all seven weekdays.
///
/// Serialized as the working-hours object booking pages store:
///
/// ```json
/// {"monday": {"enabled": true, "start": "09:00", "end": "17:00"}, "saturday": {"enabled": false}, ...}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WeekRecord", into = "WeekRecord")]
pub struct WeeklySchedule {
    days: [DaySchedule; 7],
}

impl WeeklySchedule {
    /// Build a schedule from Monday..Sunday entries.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidSchedule`] if an enabled day lacks a
    /// valid `start < end` pair or no day is enabled.
    pub fn new(days: [DaySchedule; 7]) -> Result<Self> {
        for (day, schedule) in WEEKDAYS.iter().zip(days.iter()) {
            schedule.validate(*day)?;
        }
        if !days.iter().any(|d| d.enabled) {
            return Err(BookingError::InvalidSchedule(
                "at least one day must be enabled".to_string(),
            ));
        }
        Ok(Self { days })
    }

    /// Parse the stored working-hours JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BookingError::InvalidSchedule(e.to_string()))
    }

    /// Monday to Friday, 09:00–17:00.
    pub fn business_hours() -> Self {
        let open = DaySchedule::open(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        );
        let closed = DaySchedule::closed();
        Self {
            days: [open, open, open, open, open, closed, closed],
        }
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday.num_days_from_monday() as usize]
    }
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self::business_hours()
    }
}

/// Wire shape of [`WeeklySchedule`]; every weekday key must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeekRecord {
    monday: Option<DaySchedule>,
    tuesday: Option<DaySchedule>,
    wednesday: Option<DaySchedule>,
    thursday: Option<DaySchedule>,
    friday: Option<DaySchedule>,
    saturday: Option<DaySchedule>,
    sunday: Option<DaySchedule>,
}

impl TryFrom<WeekRecord> for WeeklySchedule {
    type Error = BookingError;

    fn try_from(record: WeekRecord) -> Result<Self> {
        let entries = [
            record.monday,
            record.tuesday,
            record.wednesday,
            record.thursday,
            record.friday,
            record.saturday,
            record.sunday,
        ];
        let mut days = [DaySchedule::closed(); 7];
        for (i, entry) in entries.into_iter().enumerate() {
            days[i] = entry.ok_or_else(|| {
                BookingError::InvalidSchedule(format!(
                    "missing configuration for '{}'",
                    weekday_name(WEEKDAYS[i])
                ))
            })?;
        }
        WeeklySchedule::new(days)
    }
}

impl From<WeeklySchedule> for WeekRecord {
    fn from(schedule: WeeklySchedule) -> Self {
        let [mon, tue, wed, thu, fri, sat, sun] = schedule.days;
        WeekRecord {
            monday: Some(mon),
            tuesday: Some(tue),
            wednesday: Some(wed),
            thursday: Some(thu),
            friday: Some(fri),
            saturday: Some(sat),
            sunday: Some(sun),
        }
    }
}

// ── DateOverride ────────────────────────────────────────────────────────────

/// A one-off change to a member's hours on a specific date (vacation, a
/// shortened day, an extra working Saturday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverride {
    pub date: NaiveDate,
    /// `false` removes the whole date.
    pub available: bool,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub custom_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub custom_end: Option<NaiveTime>,
}

impl DateOverride {
    /// The member is away for the whole date.
    pub fn unavailable(date: NaiveDate) -> Self {
        Self {
            date,
            available: false,
            custom_start: None,
            custom_end: None,
        }
    }

    /// The member works `start`–`end` on this date regardless of the weekday.
    pub fn custom_hours(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            date,
            available: true,
            custom_start: Some(start),
            custom_end: Some(end),
        }
    }
}

/// Reject duplicate dates and inverted custom hours.
pub fn validate_overrides(overrides: &[DateOverride]) -> Result<()> {
    for (i, o) in overrides.iter().enumerate() {
        if overrides[..i].iter().any(|prev| prev.date == o.date) {
            return Err(BookingError::InvalidSchedule(format!(
                "duplicate date override for {}",
                o.date
            )));
        }
        if let (Some(start), Some(end)) = (o.custom_start, o.custom_end) {
            if end <= start {
                return Err(BookingError::InvalidSchedule(format!(
                    "custom end hours must be after custom start hours on {}",
                    o.date
                )));
            }
        }
    }
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────────────

/// A working interval on one date, still in the member's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub zone: ZoneId,
}

impl LocalInterval {
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// Resolve the weekly schedule to the working interval on `date`.
///
/// Returns `Ok(None)` if the weekday is disabled.
///
/// # Errors
///
/// Returns [`BookingError::InvalidSchedule`] if the day is enabled without a
/// `start < end` pair. Intervals crossing midnight are not supported.
pub fn resolve(
    schedule: &WeeklySchedule,
    date: NaiveDate,
    zone: ZoneId,
) -> Result<Option<LocalInterval>> {
    let day = schedule.day(date.weekday());
    if !day.enabled {
        return Ok(None);
    }
    let (start, end) = day.start.zip(day.end).ok_or_else(|| {
        BookingError::InvalidSchedule(format!(
            "'{}' is enabled but missing 'start' or 'end' time",
            weekday_name(date.weekday())
        ))
    })?;
    interval_on(date, start, end, zone).map(Some)
}

/// Like [`resolve`], but a [`DateOverride`] for `date` takes precedence.
///
/// An available override without custom hours leaves the weekly hours in
/// place.
pub fn resolve_with_overrides(
    schedule: &WeeklySchedule,
    overrides: &[DateOverride],
    date: NaiveDate,
    zone: ZoneId,
) -> Result<Option<LocalInterval>> {
    match overrides.iter().find(|o| o.date == date) {
        Some(o) if !o.available => Ok(None),
        Some(DateOverride {
            custom_start: Some(start),
            custom_end: Some(end),
            ..
        }) => interval_on(date, *start, *end, zone).map(Some),
        _ => resolve(schedule, date, zone),
    }
}

fn interval_on(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    zone: ZoneId,
) -> Result<LocalInterval> {
    if end <= start {
        return Err(BookingError::InvalidSchedule(format!(
            "working hours on {date} end ({end}) at or before they start ({start})"
        )));
    }
    Ok(LocalInterval {
        start: date.and_time(start),
        end: date.and_time(end),
        zone,
    })
}

// ── "HH:MM" serde ───────────────────────────────────────────────────────────

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| {
            NaiveTime::parse_from_str(&s, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
                .map_err(|_| de::Error::custom(format!("invalid time '{s}', expected HH:MM")))
        })
        .transpose()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const WORKING_HOURS: &str = r#"{
        "monday": {"enabled": true, "start": "09:00", "end": "17:00"},
        "tuesday": {"enabled": true, "start": "09:00", "end": "17:00"},
        "wednesday": {"enabled": true, "start": "10:00", "end": "14:30"},
        "thursday": {"enabled": true, "start": "09:00", "end": "17:00"},
        "friday": {"enabled": true, "start": "09:00", "end": "12:00"},
        "saturday": {"enabled": false},
        "sunday": {"enabled": false}
    }"#;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cph() -> ZoneId {
        ZoneId::parse("Europe/Copenhagen").unwrap()
    }

    // ── parsing ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_working_hours_json() {
        let schedule = WeeklySchedule::from_json(WORKING_HOURS).unwrap();
        assert_eq!(schedule.day(Weekday::Wed), &DaySchedule::open(t(10, 0), t(14, 30)));
        assert!(!schedule.day(Weekday::Sun).enabled);
    }

    #[test]
    fn test_parse_accepts_seconds() {
        let json = WORKING_HOURS.replace("\"10:00\"", "\"10:00:00\"");
        let schedule = WeeklySchedule::from_json(&json).unwrap();
        assert_eq!(schedule.day(Weekday::Wed).start, Some(t(10, 0)));
    }

    #[test]
    fn test_parse_missing_weekday() {
        let json = r#"{"monday": {"enabled": true, "start": "09:00", "end": "17:00"}}"#;
        let err = WeeklySchedule::from_json(json).unwrap_err();
        assert!(err.to_string().contains("tuesday"), "got: {err}");
    }

    #[test]
    fn test_parse_end_before_start() {
        let json = WORKING_HOURS.replace("\"14:30\"", "\"09:00\"");
        let err = WeeklySchedule::from_json(&json).unwrap_err();
        assert!(matches!(err, BookingError::InvalidSchedule(_)));
        assert!(err.to_string().contains("wednesday"), "got: {err}");
    }

    #[test]
    fn test_parse_enabled_without_hours() {
        let json = WORKING_HOURS.replace(
            r#""saturday": {"enabled": false}"#,
            r#""saturday": {"enabled": true}"#,
        );
        assert!(WeeklySchedule::from_json(&json).is_err());
    }

    #[test]
    fn test_parse_bad_time_format() {
        let json = WORKING_HOURS.replace("\"12:00\"", "\"noon\"");
        assert!(WeeklySchedule::from_json(&json).is_err());
    }

    #[test]
    fn test_no_enabled_day_rejected() {
        let err = WeeklySchedule::new([DaySchedule::closed(); 7]).unwrap_err();
        assert!(err.to_string().contains("at least one day"), "got: {err}");
    }

    #[test]
    fn test_serialize_round_trips_through_json() {
        let schedule = WeeklySchedule::business_hours();
        let json = serde_json::to_string(&schedule).unwrap();
        assert!(json.contains(r#""monday":{"enabled":true,"start":"09:00","end":"17:00"}"#));
        assert_eq!(WeeklySchedule::from_json(&json).unwrap(), schedule);
    }

    // ── resolve ─────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_enabled_day() {
        let schedule = WeeklySchedule::from_json(WORKING_HOURS).unwrap();
        // 2025-06-04 is a Wednesday
        let interval = resolve(&schedule, date(2025, 6, 4), cph()).unwrap().unwrap();
        assert_eq!(interval.start, date(2025, 6, 4).and_time(t(10, 0)));
        assert_eq!(interval.end, date(2025, 6, 4).and_time(t(14, 30)));
        assert_eq!(interval.zone, cph());
    }

    #[test]
    fn test_resolve_disabled_day() {
        let schedule = WeeklySchedule::business_hours();
        // 2025-06-07 is a Saturday
        assert!(resolve(&schedule, date(2025, 6, 7), cph()).unwrap().is_none());
    }

    #[test]
    fn test_resolve_rechecks_inverted_hours() {
        // Bypass `new` the way an untrusted in-memory value could.
        let mut days = [DaySchedule::closed(); 7];
        days[0] = DaySchedule::open(t(17, 0), t(9, 0));
        let schedule = WeeklySchedule { days };
        let err = resolve(&schedule, date(2025, 6, 2), cph()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidSchedule(_)));
    }

    // ── overrides ───────────────────────────────────────────────────────

    #[test]
    fn test_override_unavailable_removes_day() {
        let schedule = WeeklySchedule::business_hours();
        let overrides = [DateOverride::unavailable(date(2025, 6, 2))];
        let resolved = resolve_with_overrides(&schedule, &overrides, date(2025, 6, 2), cph()).unwrap();
        assert!(resolved.is_none());
        // Other dates are untouched
        let tuesday = resolve_with_overrides(&schedule, &overrides, date(2025, 6, 3), cph()).unwrap();
        assert!(tuesday.is_some());
    }

    #[test]
    fn test_override_custom_hours_on_day_off() {
        let schedule = WeeklySchedule::business_hours();
        let saturday = date(2025, 6, 7);
        let overrides = [DateOverride::custom_hours(saturday, t(10, 0), t(13, 0))];
        let interval = resolve_with_overrides(&schedule, &overrides, saturday, cph())
            .unwrap()
            .unwrap();
        assert_eq!(interval.start.time(), t(10, 0));
        assert_eq!(interval.end.time(), t(13, 0));
    }

    #[test]
    fn test_validate_overrides_duplicate_date() {
        let d = date(2025, 6, 2);
        let overrides = [DateOverride::unavailable(d), DateOverride::custom_hours(d, t(9, 0), t(10, 0))];
        assert!(validate_overrides(&overrides).is_err());
    }

    #[test]
    fn test_override_json_shape() {
        let o: DateOverride = serde_json::from_str(
            r#"{"date": "2025-12-24", "available": true, "custom_start": "09:00", "custom_end": "12:00"}"#,
        )
        .unwrap();
        assert_eq!(o, DateOverride::custom_hours(date(2025, 12, 24), t(9, 0), t(12, 0)));
    }
}
