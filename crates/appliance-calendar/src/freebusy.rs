//! Free time of an appliance within a window.
//!
//! Sorts non-declined bookings by start time, merges overlapping busy
//! periods, then computes the gaps between merged periods.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Booking, BookingStatus};

/// A free time slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Merge overlapping or adjacent busy periods, clipped to the given window.
///
/// Declined bookings do not occupy the appliance. Returns a sorted,
/// non-overlapping list of (start, end) intervals.
pub fn merge_busy_periods<B: Booking>(
    bookings: &[B],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = bookings
        .iter()
        .filter(|b| b.status() != BookingStatus::Declined)
        .filter(|b| b.time_start() < window_end && b.time_end() > window_start)
        .map(|b| (b.time_start().max(window_start), b.time_end().min(window_end)))
        .collect();

    intervals.sort_unstable();

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
}

/// Find free time slots within a window, given the appliance's bookings.
pub fn find_free_slots<B: Booking>(
    bookings: &[B],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<FreeSlot> {
    let mut free_slots = Vec::new();
    let mut cursor = window_start;

    for (busy_start, busy_end) in merge_busy_periods(bookings, window_start, window_end) {
        if cursor < busy_start {
            free_slots.push(FreeSlot {
                start: cursor,
                end: busy_start,
                duration_minutes: (busy_start - cursor).num_minutes(),
            });
        }
        cursor = cursor.max(busy_end);
    }

    if cursor < window_end {
        free_slots.push(FreeSlot {
            start: cursor,
            end: window_end,
            duration_minutes: (window_end - cursor).num_minutes(),
        });
    }

    free_slots
}

/// First free slot of at least `min_duration_minutes` within the window.
pub fn find_first_free_slot<B: Booking>(
    bookings: &[B],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_duration_minutes: i64,
) -> Option<FreeSlot> {
    find_free_slots(bookings, window_start, window_end)
        .into_iter()
        .find(|slot| slot.duration_minutes >= min_duration_minutes)
}
