//! Local time-of-day bounds and closed calendar date ranges.

use std::fmt;

use chrono::{
    DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc,
    Weekday,
};
use serde::{Serialize, Serializer};

use crate::error::{CalendarError, Result};

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_DAY: u64 = 86_400 * NANOS_PER_SECOND;

/// Offset from local midnight, ranging over `00:00..=24:00`.
///
/// `NaiveTime` cannot express the end of a day, which full-day and
/// first-day segments need as their exclusive upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u64);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(NANOS_PER_DAY);

    /// `hour:minute`, clamped to `24:00`.
    pub fn hm(hour: u32, minute: u32) -> Self {
        let nanos = (u64::from(hour) * 3600 + u64::from(minute) * 60) * NANOS_PER_SECOND;
        Self(nanos.min(NANOS_PER_DAY))
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        // Leap-second nanos (>= 1e9) fold into the following second.
        let nanos = u64::from(time.num_seconds_from_midnight()) * NANOS_PER_SECOND
            + u64::from(time.nanosecond());
        Self(nanos.min(NANOS_PER_DAY))
    }

    /// Absolute local date-time of this offset on `date`. `24:00` maps to the next midnight.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        // self.0 <= NANOS_PER_DAY, which fits in i64.
        date.and_time(NaiveTime::MIN) + TimeDelta::nanoseconds(self.0 as i64)
    }

    pub fn minutes_until(self, later: TimeOfDay) -> i64 {
        (later.0 as i64 - self.0 as i64) / (60 * NANOS_PER_SECOND as i64)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.0 / NANOS_PER_SECOND;
        let (h, m, s) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
        if s == 0 {
            write!(f, "{h:02}:{m:02}")
        } else {
            write!(f, "{h:02}:{m:02}:{s:02}")
        }
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Closed range of calendar dates `[start, end]`. Never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(CalendarError::Validation(format!(
                "date range ends ({end}) before it starts ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Every date of the given month.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CalendarError::Validation(format!("no such month: {year}-{month}")))?;
        let end = start
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| {
                CalendarError::Validation(format!("month out of range: {year}-{month}"))
            })?;
        Ok(Self { start, end })
    }

    /// The seven days containing `date`, beginning on `week_start`.
    pub fn week_of(date: NaiveDate, week_start: Weekday) -> Self {
        let start = date.week(week_start).first_day();
        Self {
            start,
            end: start + Days::new(6),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn len(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Half-open span of instants `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// From the first local midnight of `range` to the midnight after its last day.
    pub fn local_days<Tz: TimeZone>(range: DateRange, tz: &Tz) -> Self {
        Self {
            start: day_bounds(range.start, tz).0,
            end: day_bounds(range.end, tz).1,
        }
    }

    /// Whether `[start, end)` shares at least one instant with the window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// The instants bounding the local calendar day `date` in zone `tz`, as
/// `[midnight, next midnight)`.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date, tz);
    let end = date.succ_opt().map_or(start, |next| local_midnight(next, tz));
    (start, end)
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    // A zone may skip midnight on a DST change; fall back to UTC midnight then.
    tz.from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc))
}
