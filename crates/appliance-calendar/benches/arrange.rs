use std::hint::black_box;

use appliance_calendar::model::Role;
use appliance_calendar::{
    arrange_events, layout_day, sort_for_layout, split_events, Appliance, BookingStatus,
    CalendarEvent, EventId, User, UserId,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// `count` bookings on one day with staggered starts and varying lengths,
/// so groups of several columns form.
fn dense_day(count: usize) -> Vec<CalendarEvent> {
    let appliance = Appliance::new("scope", "Oscilloscope", UserId::new("olga"));
    let user = User::new("ivan", "Ivan", Role::User);
    let day_start = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();

    (0..count)
        .map(|i| {
            let offset = (i as i64 * 37) % (23 * 60);
            let length = 15 + (i as i64 * 53) % 180;
            let start = day_start + Duration::minutes(offset);
            CalendarEvent {
                id: EventId::new(format!("e{i:04}")),
                appliance: appliance.clone(),
                user: user.clone(),
                time_start: start,
                time_end: start + Duration::minutes(length),
                status: BookingStatus::Approved,
                commentary: None,
                manager_commentary: None,
                managed_by: None,
                managed_time: None,
            }
        })
        .collect()
}

fn bench_arrange(c: &mut Criterion) {
    let mut group = c.benchmark_group("arrange_events");
    for count in [10, 100, 500] {
        let events = dense_day(count);
        let mut segments = split_events(&events, &Utc);
        sort_for_layout(&mut segments);
        group.bench_with_input(BenchmarkId::from_parameter(count), &segments, |b, segments| {
            b.iter(|| arrange_events(black_box(segments.iter().copied())))
        });
    }
    group.finish();
}

fn bench_layout_day(c: &mut Criterion) {
    let events = dense_day(200);
    let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    c.bench_function("layout_day_200", |b| {
        b.iter(|| layout_day(black_box(&events), date, &Utc))
    });
}

criterion_group!(benches, bench_arrange, bench_layout_day);
criterion_main!(benches);
