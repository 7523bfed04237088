//! Overlap tests between day segments.
//!
//! Segments are half-open `[start, end)` intervals on a single date, so two
//! segments that merely touch (`a.end == b.start`) do not overlap.

use crate::split::PositionedEvent;

/// Two segments overlap iff they share a date and their time ranges intersect.
pub fn overlaps(a: &PositionedEvent<'_>, b: &PositionedEvent<'_>) -> bool {
    a.date == b.date && a.start < b.end && b.start < a.end
}

/// Whether `segment` overlaps any segment already placed in `column`.
pub fn column_overlaps(column: &[PositionedEvent<'_>], segment: &PositionedEvent<'_>) -> bool {
    column.iter().any(|placed| overlaps(placed, segment))
}

impl PositionedEvent<'_> {
    pub fn overlaps_with(&self, other: &PositionedEvent<'_>) -> bool {
        overlaps(self, other)
    }
}
