//! Detect bookings that collide with a requested time range.
//!
//! Adjacent bookings (where one ends exactly when another starts) are NOT conflicts.

use chrono::{DateTime, Utc};

use crate::model::{ApplianceId, Booking, BookingStatus, EventId};

/// An existing booking overlapping the requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<'a, B> {
    pub booking: &'a B,
    pub overlap_minutes: i64,
}

/// Find every booking whose range intersects `[start, end)`.
///
/// Two ranges overlap when `a.start < b.end && b.start < a.end`.
/// The overlap duration is `min(a.end, b.end) - max(a.start, b.start)`.
pub fn find_conflicts<'a, B: Booking>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &'a [B],
) -> Vec<Conflict<'a, B>> {
    existing
        .iter()
        .filter(|b| start < b.time_end() && b.time_start() < end)
        .map(|booking| {
            let overlap_start = start.max(booking.time_start());
            let overlap_end = end.min(booking.time_end());
            Conflict {
                booking,
                overlap_minutes: (overlap_end - overlap_start).num_minutes(),
            }
        })
        .collect()
}

/// A requested booking slot on an appliance.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRequest<'a> {
    pub appliance_id: &'a ApplianceId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The booking being moved, which never conflicts with itself.
    pub exclude: Option<&'a EventId>,
}

/// First approved booking of the same appliance that the slot would collide with.
pub fn find_booking_conflict<'a, B: Booking>(
    request: &SlotRequest<'_>,
    existing: &'a [B],
) -> Option<&'a B> {
    existing
        .iter()
        .filter(|b| b.appliance_id() == request.appliance_id)
        .filter(|b| b.status() == BookingStatus::Approved)
        .filter(|b| request.exclude != Some(b.id()))
        .find(|b| request.start < b.time_end() && b.time_start() < request.end)
}
