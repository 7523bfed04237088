//! Port to the remote booking store, and an in-process implementation.
//!
//! Live queries are [`Subscription`]s: each item is a complete snapshot of
//! the query's result, superseding the previous one. Dropping the
//! subscription releases its registration with the source.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{CalendarError, Result};
use crate::model::{ApplianceId, EventId, EventPatch, EventRecord};
use crate::time::{DateRange, TimeWindow};

/// A full result set delivered by a live query.
pub type Snapshot = Vec<EventRecord>;

/// Booking store operations consumed by the calendar.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Live stream of every booking.
    async fn subscribe_all(&self) -> Result<Subscription>;

    /// Live stream of bookings running at any time during the local day
    /// `date` in zone `tz`, including ones that started on an earlier day.
    async fn subscribe_date(&self, date: NaiveDate, tz: Tz) -> Result<Subscription>;

    /// Bookings running at any time during the local days of the closed
    /// `range` in zone `tz`.
    async fn events_in_range(&self, range: DateRange, tz: Tz) -> Result<Vec<EventRecord>>;

    /// Bookings of `appliance` starting on `date`.
    async fn appliance_events_on(
        &self,
        appliance: &ApplianceId,
        date: NaiveDate,
    ) -> Result<Vec<EventRecord>>;

    /// Bookings of `appliance` still running after `time`.
    async fn appliance_events_after(
        &self,
        appliance: &ApplianceId,
        time: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>>;

    async fn has_any_event(&self, appliance: &ApplianceId) -> Result<bool>;

    async fn create(&self, record: EventRecord) -> Result<()>;

    async fn update(&self, id: &EventId, patch: EventPatch) -> Result<()>;

    async fn delete(&self, id: &EventId) -> Result<()>;

    /// Delete every booking of `appliance`, returning how many were removed.
    async fn delete_all_for_appliance(&self, appliance: &ApplianceId) -> Result<usize>;
}

/// Run `fut`, failing with [`CalendarError::Timeout`] once `limit` elapses.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?limit, "data source call timed out");
            Err(CalendarError::Timeout(limit))
        }
    }
}

struct Release(Option<Box<dyn FnOnce() + Send>>);

impl Drop for Release {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

/// A live query. Yields snapshots until the source closes it; unsubscribes on drop.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    _release: Release,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            _release: Release(Some(Box::new(release))),
        }
    }

    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Query {
    All,
    Window(TimeWindow),
}

impl Query {
    fn matches(self, record: &EventRecord) -> bool {
        match self {
            Query::All => true,
            Query::Window(window) => window.intersects(record.time_start, record.time_end),
        }
    }
}

struct Subscriber {
    query: Query,
    sender: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Store {
    records: BTreeMap<EventId, EventRecord>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
}

impl Store {
    fn snapshot(&self, query: Query) -> Snapshot {
        self.records
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect()
    }

    /// Push a fresh snapshot to every live subscriber, forgetting closed ones.
    fn publish(&mut self) {
        let records = &self.records;
        self.subscribers.retain(|_, sub| {
            let snapshot: Snapshot = records
                .values()
                .filter(|r| sub.query.matches(r))
                .cloned()
                .collect();
            sub.sender.send(snapshot).is_ok()
        });
    }
}

/// In-process booking store with live snapshot delivery.
#[derive(Clone, Default)]
pub struct MemoryEventSource {
    store: Arc<Mutex<Store>>,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = EventRecord>) -> Self {
        let source = Self::new();
        {
            let mut store = source.lock();
            for record in records {
                store.records.insert(record.id.clone(), record);
            }
        }
        source
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.lock().records.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, query: Query) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut store = self.lock();
        let id = store.next_subscriber;
        store.next_subscriber += 1;
        // The receiver is alive, so the initial send cannot fail.
        let _ = sender.send(store.snapshot(query));
        store.subscribers.insert(id, Subscriber { query, sender });
        drop(store);

        let weak: Weak<Mutex<Store>> = Arc::downgrade(&self.store);
        Subscription::new(receiver, move || {
            if let Some(store) = weak.upgrade() {
                store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .remove(&id);
            }
        })
    }

    fn query<F>(&self, predicate: F) -> Vec<EventRecord>
    where
        F: Fn(&EventRecord) -> bool,
    {
        self.lock()
            .records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn subscribe_all(&self) -> Result<Subscription> {
        Ok(self.subscribe(Query::All))
    }

    async fn subscribe_date(&self, date: NaiveDate, tz: Tz) -> Result<Subscription> {
        let window = TimeWindow::local_days(DateRange::day(date), &tz);
        Ok(self.subscribe(Query::Window(window)))
    }

    async fn events_in_range(&self, range: DateRange, tz: Tz) -> Result<Vec<EventRecord>> {
        let query = Query::Window(TimeWindow::local_days(range, &tz));
        Ok(self.query(|r| query.matches(r)))
    }

    async fn appliance_events_on(
        &self,
        appliance: &ApplianceId,
        date: NaiveDate,
    ) -> Result<Vec<EventRecord>> {
        Ok(self.query(|r| r.appliance_id == *appliance && r.date == date))
    }

    async fn appliance_events_after(
        &self,
        appliance: &ApplianceId,
        time: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>> {
        Ok(self.query(|r| r.appliance_id == *appliance && r.time_end > time))
    }

    async fn has_any_event(&self, appliance: &ApplianceId) -> Result<bool> {
        Ok(self
            .lock()
            .records
            .values()
            .any(|r| r.appliance_id == *appliance))
    }

    async fn create(&self, record: EventRecord) -> Result<()> {
        let mut store = self.lock();
        store.records.insert(record.id.clone(), record);
        store.publish();
        Ok(())
    }

    async fn update(&self, id: &EventId, patch: EventPatch) -> Result<()> {
        let mut store = self.lock();
        let record = store
            .records
            .get_mut(id)
            .ok_or_else(|| CalendarError::NotFound(id.clone()))?;
        patch.apply(record);
        store.publish();
        Ok(())
    }

    async fn delete(&self, id: &EventId) -> Result<()> {
        let mut store = self.lock();
        store
            .records
            .remove(id)
            .ok_or_else(|| CalendarError::NotFound(id.clone()))?;
        store.publish();
        Ok(())
    }

    async fn delete_all_for_appliance(&self, appliance: &ApplianceId) -> Result<usize> {
        let mut store = self.lock();
        let before = store.records.len();
        store.records.retain(|_, r| r.appliance_id != *appliance);
        let removed = before - store.records.len();
        if removed > 0 {
            store.publish();
        }
        Ok(removed)
    }
}
