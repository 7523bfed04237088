//! Column arrangement for day views.
//!
//! A greedy, single-pass interval-graph coloring. Segments are consumed in
//! the order given and packed into columns of a working *group*; a segment
//! that overlaps nothing in the group closes it. Closed groups are never
//! revisited, so `col_total` reflects the column count of a segment's own
//! group at the moment it was flushed, not the widest group of the pass.

use std::cmp::Ordering;

use chrono::{NaiveDate, TimeZone};

use crate::model::CalendarEvent;
use crate::overlap::{column_overlaps, overlaps};
use crate::split::{split_events, PositionedEvent};

/// Assign `col`, `col_total` and `col_span` to every segment.
///
/// Callers must pre-sort the input (see [`sort_for_layout`]) for the output
/// to be deterministic. Layout fields already present on the input are reset
/// before placement, so re-arranging an arranged sequence in the same order
/// reproduces the same assignment.
///
/// For each segment the columns of the current group are scanned left to
/// right for a contiguous run of columns it does not overlap:
///
/// 1. no free column: open a new column, then widen every earlier segment
///    whose span reaches the new column's edge and that does not overlap the
///    newcomer;
/// 2. every column free: flush the group and start a new one;
/// 3. otherwise: place into the first free column spanning the whole free run.
pub fn arrange_events<'a, I>(segments: I) -> Vec<PositionedEvent<'a>>
where
    I: IntoIterator<Item = PositionedEvent<'a>>,
{
    let mut arranged = Vec::new();
    let mut group: Vec<Vec<PositionedEvent<'a>>> = Vec::new();

    for mut segment in segments {
        segment.col = 0;
        segment.col_total = 0;
        segment.col_span = 1;

        let mut first_free: Option<usize> = None;
        let mut free_run = 0;
        for (index, column) in group.iter().enumerate() {
            if column_overlaps(column, &segment) {
                if first_free.is_none() {
                    continue;
                }
                break;
            }
            first_free.get_or_insert(index);
            free_run += 1;
        }

        match first_free {
            None => {
                let new_col = group.len();
                for (index, column) in group.iter_mut().enumerate() {
                    for placed in column.iter_mut() {
                        if index + placed.col_span == new_col && !overlaps(placed, &segment) {
                            placed.col_span += 1;
                        }
                    }
                }
                group.push(vec![segment]);
            }
            Some(_) if free_run == group.len() => {
                flush_group(&mut group, &mut arranged);
                group.push(vec![segment]);
            }
            Some(col) => {
                segment.col_span = free_run;
                group[col].push(segment);
            }
        }
    }

    flush_group(&mut group, &mut arranged);
    arranged
}

fn flush_group<'a>(group: &mut Vec<Vec<PositionedEvent<'a>>>, out: &mut Vec<PositionedEvent<'a>>) {
    let total = group.len();
    if total > 0 {
        tracing::debug!(columns = total, "flushing layout group");
    }
    for (col, column) in group.drain(..).enumerate() {
        out.extend(column.into_iter().map(|mut segment| {
            segment.col = col;
            segment.col_total = total;
            segment
        }));
    }
}

/// Layout order: date, then start time, then booking id.
pub fn layout_order(a: &PositionedEvent<'_>, b: &PositionedEvent<'_>) -> Ordering {
    a.date
        .cmp(&b.date)
        .then(a.start.cmp(&b.start))
        .then_with(|| a.event.id.cmp(&b.event.id))
}

pub fn sort_for_layout(segments: &mut [PositionedEvent<'_>]) {
    segments.sort_by(layout_order);
}

/// Split, sort and arrange `events` into the segments of one day.
pub fn layout_day<'a, Tz: TimeZone>(
    events: &'a [CalendarEvent],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<PositionedEvent<'a>> {
    let mut segments = split_events(events, tz);
    segments.retain(|s| s.date == date);
    sort_for_layout(&mut segments);
    arrange_events(segments)
}
