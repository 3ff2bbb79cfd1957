//! Department availability benchmarks
//!
//! Measures aggregation cost as the roster and the date range grow, with a
//! realistic number of existing bookings per member.
//!
//! Run with: `cargo bench --bench availability -p booking-engine`

use std::collections::HashMap;
use std::hint::black_box;

use booking_engine::{
    aggregate, Algorithm, Booking, DateRange, Department, EngineConfig, Member, MemberCalendar,
    MemberId, ZoneId,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const ZONES: &[&str] = &["Europe/Copenhagen", "America/New_York", "Asia/Kolkata"];

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn department(members: usize) -> Department {
    Department {
        id: "bench".into(),
        zone: ZoneId::parse("Europe/Copenhagen").unwrap(),
        algorithm: Algorithm::RoundRobin,
        members: (0..members)
            .map(|i| {
                let zone = ZoneId::parse(ZONES[i % ZONES.len()]).unwrap();
                Member::new(format!("member-{i:03}"), zone)
            })
            .collect(),
        leader: None,
    }
}

/// Two one-hour bookings per member per weekday over four weeks.
fn calendars(department: &Department) -> HashMap<MemberId, MemberCalendar> {
    let base = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
    department
        .members
        .iter()
        .enumerate()
        .map(|(i, member)| {
            let bookings = (0..28)
                .flat_map(|day| {
                    let offset = (i % 8) as i64;
                    [10 + offset, 14 + offset].map(|h| {
                        let start = base + Duration::days(day) + Duration::hours(h);
                        Booking::confirmed(member.id.clone(), start, start + Duration::hours(1))
                    })
                })
                .collect();
            (member.id.clone(), MemberCalendar { bookings, busy: Vec::new() })
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Aggregation benchmarks
// -----------------------------------------------------------------------------

fn bench_roster_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_roster");
    let config = EngineConfig::default();
    let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let range = DateRange::new(start, start + Duration::days(6)).unwrap();

    for members in [1usize, 5, 20, 50] {
        let dept = department(members);
        let cals = calendars(&dept);
        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, _| {
            b.iter(|| {
                black_box(
                    aggregate(&dept, &cals, range, Duration::minutes(30), &config, None).unwrap(),
                )
            });
        });
    }
    group.finish();
}

fn bench_range_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_range");
    let config = EngineConfig::default();
    let dept = department(10);
    let cals = calendars(&dept);
    let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

    for days in [1i64, 7, 28] {
        let range = DateRange::new(start, start + Duration::days(days - 1)).unwrap();
        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::from_parameter(days), &range, |b, range| {
            b.iter(|| {
                black_box(
                    aggregate(&dept, &cals, *range, Duration::minutes(15), &config, None).unwrap(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_roster_size, bench_range_length);
criterion_main!(benches);
