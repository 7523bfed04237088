//! Per-date cache of visible bookings driving the calendar views.
//!
//! [`CalendarViewState`] is a reducer: it only changes through
//! [`CalendarViewState::apply`], which the single owning controller calls
//! with the outcome of every request and snapshot.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};

use crate::arrange::layout_day;
use crate::model::CalendarEvent;
use crate::split::PositionedEvent;
use crate::time::DateRange;

/// Cache entry for one date. A date with no entry has not been requested.
#[derive(Debug, Clone, PartialEq)]
pub enum EventsState {
    Loading,
    Loaded(Vec<CalendarEvent>),
    /// The fetch failed or timed out before any data arrived.
    Failed(String),
}

impl EventsState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, EventsState::Loaded(_))
    }
}

/// A change to the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheUpdate {
    /// A fetch for `range` is about to be issued.
    Requested { range: DateRange, force: bool },
    /// A full snapshot answering `range`, already grouped by date.
    Snapshot {
        range: DateRange,
        by_date: BTreeMap<NaiveDate, Vec<CalendarEvent>>,
    },
    /// The fetch for `range` failed.
    Failed { range: DateRange, reason: String },
    /// Forget every entry, e.g. after the viewing user changed.
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarViewState {
    day_events: BTreeMap<NaiveDate, EventsState>,
}

impl CalendarViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&EventsState> {
        self.day_events.get(&date)
    }

    pub fn events(&self, date: NaiveDate) -> Option<&[CalendarEvent]> {
        match self.day_events.get(&date) {
            Some(EventsState::Loaded(events)) => Some(events),
            _ => None,
        }
    }

    pub fn is_loaded(&self, date: NaiveDate) -> bool {
        self.get(date).is_some_and(EventsState::is_loaded)
    }

    /// Dates of `range` that still need a fetch.
    pub fn missing_dates(&self, range: DateRange) -> Vec<NaiveDate> {
        range.days().filter(|d| !self.is_loaded(*d)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &EventsState)> {
        self.day_events.iter()
    }

    /// Apply an update; returns whether any entry changed.
    ///
    /// A request never turns `Loaded` back into `Loading` unless forced, and a
    /// failure only settles entries that are still `Loading`.
    pub fn apply(&mut self, update: CacheUpdate) -> bool {
        let mut changed = false;
        match update {
            CacheUpdate::Requested { range, force } => {
                for date in range.days() {
                    let mark = match self.day_events.get(&date) {
                        Some(EventsState::Loading) => false,
                        Some(EventsState::Loaded(_)) => force,
                        Some(EventsState::Failed(_)) | None => true,
                    };
                    if mark {
                        self.day_events.insert(date, EventsState::Loading);
                        changed = true;
                    }
                }
                tracing::debug!(%range, force, changed, "dates requested");
            }
            CacheUpdate::Snapshot { range, mut by_date } => {
                for date in range.days() {
                    let events = by_date.remove(&date).unwrap_or_default();
                    let next = EventsState::Loaded(events);
                    if self.day_events.get(&date) != Some(&next) {
                        self.day_events.insert(date, next);
                        changed = true;
                    }
                }
                tracing::debug!(%range, changed, "snapshot applied");
            }
            CacheUpdate::Failed { range, reason } => {
                for date in range.days() {
                    if let Some(state @ EventsState::Loading) = self.day_events.get_mut(&date) {
                        *state = EventsState::Failed(reason.clone());
                        changed = true;
                    }
                }
                tracing::debug!(%range, %reason, changed, "fetch failed");
            }
            CacheUpdate::Clear => {
                changed = !self.day_events.is_empty();
                self.day_events.clear();
            }
        }
        changed
    }

    /// Arranged segments for `date`, recomputed from the cached bookings.
    ///
    /// `None` while the date is not loaded.
    pub fn day_layout<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
    ) -> Option<Vec<PositionedEvent<'_>>> {
        self.events(date).map(|events| layout_day(events, date, tz))
    }
}
