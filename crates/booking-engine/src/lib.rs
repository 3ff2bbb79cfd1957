//! # booking-engine
//!
//! Scheduling core for team booking.
//!
//! Given a department of members, each with a weekly schedule in their own
//! timezone, the engine works out which time slots a customer can book and,
//! once a slot is booked, which member takes it. All instants are UTC;
//! wall-clock times exist only at the edges, and daylight-saving transitions
//! are handled by explicit policy rather than guessed.
//!
//! ## Modules
//!
//! - [`timezone`] — IANA zones, UTC ↔ local conversion, DST gap/overlap handling
//! - [`schedule`] — Weekly working hours and date overrides → concrete local intervals
//! - [`slots`] — Fixed-length free slots inside an interval, minus conflicts
//! - [`roster`] — Departments, members, and their booking rules
//! - [`availability`] — Union of all active members' slots for a date range
//! - [`assignment`] — Round Robin / Least Busy selection and workload statistics
//! - [`display`] — Slot labels in member and visitor zones
//! - [`service`] — The exposed calls over a [`SnapshotSource`]
//! - [`config`] — Engine policies
//! - [`error`] — Error types

pub mod assignment;
pub mod availability;
pub mod config;
pub mod display;
pub mod error;
pub mod roster;
pub mod schedule;
pub mod service;
pub mod slots;
pub mod timezone;

pub use assignment::{
    workload_report, Assignment, Balance, CounterUpdate, MemberLoad, WorkloadReport,
};
pub use availability::{
    aggregate, member_available_for, member_slots, AvailabilityResult, AvailableSlot, DateRange,
    MemberCalendar,
};
pub use config::EngineConfig;
pub use display::{convert_for_display, SlotDisplay};
pub use error::{BookingError, Result};
pub use roster::{Algorithm, AvailabilityRules, Department, Member, MemberId};
pub use schedule::{
    resolve, resolve_with_overrides, DateOverride, DaySchedule, LocalInterval, WeeklySchedule,
};
pub use service::{compute_availability, reselect_assignee, select_assignee, SnapshotSource};
pub use slots::{
    generate, Booking, BookingStatus, Interval, Slot, SlotConstraints, SlotIter, Unavailable,
};
pub use timezone::{
    localize, offset_at, to_utc, to_zone, Disambiguation, GapPolicy, UtcOffset, ZoneId,
};
