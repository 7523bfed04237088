//! Turn stored booking records into the visible, resolved bookings of a user.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone};

use crate::model::{Appliance, ApplianceId, CalendarEvent, EventRecord, User, UserId};
use crate::split::split_events;
use crate::time::DateRange;
use crate::visibility::VisibilityPolicy;

/// Lookup of the users and appliances referenced by booking records.
pub trait Directory: Send + Sync {
    fn user(&self, id: &UserId) -> Option<User>;
    fn appliance(&self, id: &ApplianceId) -> Option<Appliance>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: HashMap<UserId, User>,
    appliances: HashMap<ApplianceId, Appliance>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.insert_user(user);
        self
    }

    pub fn with_appliance(mut self, appliance: Appliance) -> Self {
        self.insert_appliance(appliance);
        self
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_appliance(&mut self, appliance: Appliance) {
        self.appliances.insert(appliance.id.clone(), appliance);
    }
}

impl Directory for InMemoryDirectory {
    fn user(&self, id: &UserId) -> Option<User> {
        self.users.get(id).cloned()
    }

    fn appliance(&self, id: &ApplianceId) -> Option<Appliance> {
        self.appliances.get(id).cloned()
    }
}

/// Resolves records against a [`Directory`] and applies a [`VisibilityPolicy`].
#[derive(Clone)]
pub struct EventAggregator {
    directory: Arc<dyn Directory>,
    policy: VisibilityPolicy,
}

impl EventAggregator {
    pub fn new(directory: Arc<dyn Directory>, policy: VisibilityPolicy) -> Self {
        Self { directory, policy }
    }

    /// Resolve one record. Unknown users or appliances become placeholders so
    /// a single dangling reference does not blank the calendar.
    pub fn resolve(&self, record: &EventRecord) -> CalendarEvent {
        let user = self.directory.user(&record.user_id).unwrap_or_else(|| {
            tracing::warn!(
                event = %record.id,
                user = %record.user_id,
                "unresolved user, using placeholder"
            );
            User::placeholder(record.user_id.clone())
        });
        let appliance = self.directory.appliance(&record.appliance_id).unwrap_or_else(|| {
            tracing::warn!(
                event = %record.id,
                appliance = %record.appliance_id,
                "unresolved appliance, using placeholder"
            );
            Appliance::placeholder(record.appliance_id.clone())
        });

        CalendarEvent {
            id: record.id.clone(),
            appliance,
            user,
            time_start: record.time_start,
            time_end: record.time_end,
            status: record.status,
            commentary: record.commentary.clone(),
            manager_commentary: record.manager_commentary.clone(),
            managed_by: record.managed_by_id.clone(),
            managed_time: record.managed_time,
        }
    }

    /// Resolve every well-formed record; records whose end is not after their start are dropped.
    pub fn map_records(&self, records: &[EventRecord]) -> Vec<CalendarEvent> {
        records
            .iter()
            .filter(|record| {
                let ok = record.time_start < record.time_end;
                if !ok {
                    tracing::warn!(event = %record.id, "dropping booking with empty time range");
                }
                ok
            })
            .map(|record| self.resolve(record))
            .collect()
    }

    /// The bookings `user` may see, ordered by start time then id.
    pub fn visible_events(&self, user: &User, records: &[EventRecord]) -> Vec<CalendarEvent> {
        let mut events = self.map_records(records);
        self.policy.retain_visible(user, &mut events);
        sort_by_start(&mut events);
        events
    }
}

pub fn sort_by_start(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| {
        a.time_start
            .cmp(&b.time_start)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Bucket bookings under every date of `range` they touch in zone `tz`.
///
/// Every date of the range gets an entry, empty when nothing is booked, so a
/// snapshot settles the whole range it answers. Input order is kept within a
/// date.
pub fn group_by_date<Tz: TimeZone>(
    events: &[CalendarEvent],
    range: DateRange,
    tz: &Tz,
) -> BTreeMap<NaiveDate, Vec<CalendarEvent>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<CalendarEvent>> =
        range.days().map(|date| (date, Vec::new())).collect();

    for event in events {
        for segment in split_events(std::slice::from_ref(event), tz) {
            if let Some(bucket) = by_date.get_mut(&segment.date) {
                bucket.push(event.clone());
            }
        }
    }

    by_date
}
