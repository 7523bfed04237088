//! Split bookings into per-day segments.
//!
//! A booking that crosses midnight (in the display timezone) becomes one
//! segment per calendar date it touches. Each segment carries local
//! time-of-day bounds on its date; the middle days of a long booking span the
//! whole day.

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use crate::model::CalendarEvent;
use crate::time::TimeOfDay;

/// Which boundaries of the original booking were cut off on a segment's date.
///
/// `End` marks the first day (the booking's end lies on a later date),
/// `Start` the last day (its start lies on an earlier date), `Both` a day
/// strictly in between, and `None` a booking contained in a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SplitType {
    None,
    Start,
    End,
    Both,
}

/// One calendar-day slice of a booking, annotated with layout columns.
///
/// `col`, `col_total` and `col_span` are assigned by
/// [`arrange_events`](crate::arrange::arrange_events); before that `col` and
/// `col_total` are zero and `col_span` is one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionedEvent<'a> {
    pub event: &'a CalendarEvent,
    pub split_type: SplitType,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub col: usize,
    pub col_total: usize,
    pub col_span: usize,
}

impl<'a> PositionedEvent<'a> {
    pub fn new(
        event: &'a CalendarEvent,
        split_type: SplitType,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Self {
        Self {
            event,
            split_type,
            date,
            start,
            end,
            col: 0,
            col_total: 0,
            col_span: 1,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        self.start.minutes_until(self.end)
    }
}

/// Split every booking into per-day segments in the zone `tz`.
///
/// Output order follows input order, and segments of one booking are emitted
/// in date order. A booking ending exactly at local midnight produces no
/// empty segment on the following date. A booking whose end is not after its
/// start yields a single zero-length segment on its start date.
pub fn split_events<'a, Tz: TimeZone>(
    events: &'a [CalendarEvent],
    tz: &Tz,
) -> Vec<PositionedEvent<'a>> {
    let mut segments = Vec::with_capacity(events.len());
    for event in events {
        split_into(event, tz, &mut segments);
    }
    segments
}

fn split_into<'a, Tz: TimeZone>(
    event: &'a CalendarEvent,
    tz: &Tz,
    out: &mut Vec<PositionedEvent<'a>>,
) {
    let start = event.time_start.with_timezone(tz).naive_local();
    let end = event.time_end.with_timezone(tz).naive_local();
    let start_date = start.date();
    let start_time = TimeOfDay::from_naive(start.time());

    if end <= start {
        out.push(PositionedEvent::new(
            event,
            SplitType::None,
            start_date,
            start_time,
            start_time,
        ));
        return;
    }

    let end_time = TimeOfDay::from_naive(end.time());
    let mut end_date = end.date();
    if end_date == start_date {
        out.push(PositionedEvent::new(
            event,
            SplitType::None,
            start_date,
            start_time,
            end_time,
        ));
        return;
    }

    // Ends at midnight: the last touched date contributes nothing.
    let closes_at_midnight = end_time == TimeOfDay::MIDNIGHT;
    if closes_at_midnight {
        end_date = end_date.pred_opt().unwrap_or(end_date);
        if end_date == start_date {
            out.push(PositionedEvent::new(
                event,
                SplitType::None,
                start_date,
                start_time,
                TimeOfDay::END_OF_DAY,
            ));
            return;
        }
    }

    for date in start_date.iter_days().take_while(|d| *d <= end_date) {
        let segment = if date == start_date {
            PositionedEvent::new(event, SplitType::End, date, start_time, TimeOfDay::END_OF_DAY)
        } else if date == end_date {
            let last_end = if closes_at_midnight {
                TimeOfDay::END_OF_DAY
            } else {
                end_time
            };
            PositionedEvent::new(event, SplitType::Start, date, TimeOfDay::MIDNIGHT, last_end)
        } else {
            PositionedEvent::new(
                event,
                SplitType::Both,
                date,
                TimeOfDay::MIDNIGHT,
                TimeOfDay::END_OF_DAY,
            )
        };
        out.push(segment);
    }
}
