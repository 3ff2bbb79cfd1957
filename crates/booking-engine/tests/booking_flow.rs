//! End-to-end flow through the exposed calls: availability, assignment,
//! counter persistence, display.

use std::cell::RefCell;

use booking_engine::{
    compute_availability, convert_for_display, select_assignee, Booking, BookingError,
    DateRange, Department, EngineConfig, Interval, MemberId, Result, Slot, SnapshotSource,
    ZoneId,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

const DEPARTMENT: &str = r#"{
    "id": "support",
    "zone": "Europe/Copenhagen",
    "algorithm": "round_robin",
    "members": [
        {"id": "alice", "zone": "Europe/Copenhagen"},
        {
            "id": "bob",
            "zone": "America/New_York",
            "schedule": {
                "monday":    {"enabled": true, "start": "09:00", "end": "17:00"},
                "tuesday":   {"enabled": true, "start": "09:00", "end": "17:00"},
                "wednesday": {"enabled": true, "start": "09:00", "end": "17:00"},
                "thursday":  {"enabled": true, "start": "09:00", "end": "17:00"},
                "friday":    {"enabled": true, "start": "09:00", "end": "13:00"},
                "saturday":  {"enabled": false},
                "sunday":    {"enabled": false}
            }
        },
        {"id": "carol", "zone": "Europe/Copenhagen", "active": false}
    ]
}"#;

/// In-memory store standing in for the booking system.
struct Store {
    department: RefCell<Department>,
    bookings: RefCell<Vec<Booking>>,
    busy: Vec<(MemberId, Interval)>,
}

impl Store {
    fn new() -> Self {
        Self {
            department: RefCell::new(Department::from_json(DEPARTMENT).unwrap()),
            bookings: RefCell::new(Vec::new()),
            busy: Vec::new(),
        }
    }
}

impl SnapshotSource for Store {
    fn department(&self, id: &str) -> Result<Department> {
        let department = self.department.borrow();
        if department.id == id {
            Ok(department.clone())
        } else {
            Err(BookingError::SnapshotUnavailable(format!("unknown department '{id}'")))
        }
    }

    fn bookings(&self, member: &MemberId, window: &Interval) -> Result<Vec<Booking>> {
        Ok(self
            .bookings
            .borrow()
            .iter()
            .filter(|b| &b.member == member && b.start < window.end && window.start < b.end)
            .cloned()
            .collect())
    }

    fn busy_blocks(&self, member: &MemberId, window: &Interval) -> Result<Vec<Interval>> {
        Ok(self
            .busy
            .iter()
            .filter(|(m, b)| m == member && b.start < window.end && window.start < b.end)
            .map(|(_, b)| *b)
            .collect())
    }
}

fn utc(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
}

fn monday() -> DateRange {
    DateRange::single(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
}

fn half_hour() -> Duration {
    Duration::minutes(30)
}

#[test]
fn test_availability_spans_both_zones() {
    let store = Store::new();
    let result = compute_availability(
        &store,
        "support",
        monday(),
        half_hour(),
        &EngineConfig::default(),
        None,
    )
    .unwrap();

    // alice 07:00–15:00 UTC, bob 13:00–21:00 UTC
    assert_eq!(result.slots.first().unwrap().slot.start, utc(7, 0));
    assert_eq!(result.slots.last().unwrap().slot.end, utc(21, 0));
    assert_eq!(result.slots.len(), 28);

    let carol = MemberId::from("carol");
    assert!(result.slots.iter().all(|s| !s.members.contains(&carol)));
}

#[test]
fn test_assignments_rotate_and_persist() {
    let store = Store::new();
    let config = EngineConfig::default();
    let slot = Slot::new(utc(13, 0), utc(13, 30)).unwrap();

    let result =
        compute_availability(&store, "support", monday(), half_hour(), &config, None).unwrap();
    let eligible: Vec<MemberId> = result.eligible_for(&slot).unwrap().iter().cloned().collect();
    assert_eq!(eligible.len(), 2);

    let mut picked = Vec::new();
    for minute in 0..4 {
        let now = utc(6, minute);
        let assignment = select_assignee(&store, "support", &slot, &eligible, now, &config).unwrap();
        assignment
            .update
            .apply(&mut store.department.borrow_mut())
            .unwrap();
        picked.push(assignment.member.to_string());
    }
    assert_eq!(picked, ["alice", "bob", "alice", "bob"]);

    let department = store.department.borrow();
    let alice = department.member(&MemberId::from("alice")).unwrap();
    assert_eq!(alice.total_assignments, 2);
    assert_eq!(alice.last_assigned_at, Some(utc(6, 2)));
}

#[test]
fn test_concurrent_selection_loses_race() {
    let store = Store::new();
    let config = EngineConfig::default();
    let slot = Slot::new(utc(13, 0), utc(13, 30)).unwrap();
    let eligible = [MemberId::from("alice"), MemberId::from("bob")];

    let first = select_assignee(&store, "support", &slot, &eligible, utc(6, 0), &config).unwrap();
    let second = select_assignee(&store, "support", &slot, &eligible, utc(6, 0), &config).unwrap();
    assert_eq!(first.member, second.member);

    first
        .update
        .apply(&mut store.department.borrow_mut())
        .unwrap();
    let err = second
        .update
        .apply(&mut store.department.borrow_mut())
        .unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_booked_member_drops_out_of_slot() {
    let store = Store::new();
    store
        .bookings
        .borrow_mut()
        .push(Booking::confirmed("alice", utc(13, 0), utc(13, 30)));

    let result = compute_availability(
        &store,
        "support",
        monday(),
        half_hour(),
        &EngineConfig::default(),
        None,
    )
    .unwrap();
    let slot = Slot::new(utc(13, 0), utc(13, 30)).unwrap();
    let eligible = result.eligible_for(&slot).unwrap();
    assert_eq!(eligible.len(), 1);
    assert!(eligible.contains(&MemberId::from("bob")));
}

#[test]
fn test_busy_calendar_blocks_member() {
    let mut store = Store::new();
    store.busy.push((
        MemberId::from("bob"),
        Interval::new(utc(13, 0), utc(21, 0)).unwrap(),
    ));
    let result = compute_availability(
        &store,
        "support",
        monday(),
        half_hour(),
        &EngineConfig::default(),
        None,
    )
    .unwrap();
    assert_eq!(result.slots.len(), 16);
    assert_eq!(result.slots.last().unwrap().slot.end, utc(15, 0));
}

#[test]
fn test_no_eligible_member() {
    let store = Store::new();
    let slot = Slot::new(utc(13, 0), utc(13, 30)).unwrap();
    let err = select_assignee(
        &store,
        "support",
        &slot,
        &[MemberId::from("carol")],
        utc(6, 0),
        &EngineConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err, BookingError::NoEligibleMember);
    assert!(!err.is_retryable());
}

#[test]
fn test_display_for_visitor() {
    let slot = Slot::new(utc(13, 0), utc(13, 30)).unwrap();
    let shown = convert_for_display(
        &slot,
        ZoneId::parse("America/New_York").unwrap(),
        Some(ZoneId::parse("Europe/Copenhagen").unwrap()),
    );
    assert_eq!(shown.primary, "09:00–09:30 America/New_York");
    assert_eq!(
        shown.secondary.as_deref(),
        Some("(15:00–15:30 Europe/Copenhagen your time)")
    );
}
