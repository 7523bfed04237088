//! Single owner of the calendar cache.
//!
//! The controller issues queries and live subscriptions against an
//! [`EventSource`], turns every result into a [`CacheUpdate`] and applies it
//! to the [`CalendarViewState`] it holds in a `watch` channel. Readers only
//! ever get a receiver; nothing else writes the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::aggregate::{group_by_date, EventAggregator};
use crate::error::{CalendarError, Result};
use crate::model::{EventRecord, User};
use crate::settings::Settings;
use crate::source::{with_timeout, EventSource};
use crate::time::DateRange;
use crate::view_state::{CacheUpdate, CalendarViewState};

/// Everything a background fetch needs to turn records into cache updates.
#[derive(Clone)]
struct Pipeline {
    aggregator: EventAggregator,
    tz: Tz,
    state: Arc<watch::Sender<CalendarViewState>>,
    user: watch::Receiver<User>,
}

impl Pipeline {
    fn apply(&self, update: CacheUpdate) -> bool {
        self.state.send_if_modified(|state| state.apply(update))
    }

    fn apply_records(&self, range: DateRange, records: &[EventRecord]) {
        let user = self.user.borrow().clone();
        let events = self.aggregator.visible_events(&user, records);
        let by_date = group_by_date(&events, range, &self.tz);
        self.apply(CacheUpdate::Snapshot { range, by_date });
    }

    fn fail(&self, range: DateRange, error: &CalendarError) {
        self.apply(CacheUpdate::Failed {
            range,
            reason: error.to_string(),
        });
    }
}

/// Marks a range failed if the request owning it is dropped before settling.
struct SettleOnDrop<'a> {
    pipeline: &'a Pipeline,
    range: DateRange,
    armed: bool,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pipeline.apply(CacheUpdate::Failed {
                range: self.range,
                reason: "request cancelled".to_string(),
            });
        }
    }
}

pub struct CalendarController {
    source: Arc<dyn EventSource>,
    pipeline: Pipeline,
    user: watch::Sender<User>,
    fetch_timeout: Duration,
    week_start: Weekday,
    live_days: Mutex<HashMap<NaiveDate, JoinHandle<()>>>,
}

impl CalendarController {
    pub fn new(
        source: Arc<dyn EventSource>,
        aggregator: EventAggregator,
        user: User,
        settings: &Settings,
    ) -> Result<Self> {
        let tz = settings.timezone()?;
        let (state, _) = watch::channel(CalendarViewState::new());
        let (user, user_rx) = watch::channel(user);
        Ok(Self {
            source,
            pipeline: Pipeline {
                aggregator,
                tz,
                state: Arc::new(state),
                user: user_rx,
            },
            user,
            fetch_timeout: settings.fetch_timeout(),
            week_start: settings.week_start,
            live_days: Mutex::new(HashMap::new()),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.pipeline.tz
    }

    /// Receiver notified whenever a cache entry changes.
    pub fn subscribe(&self) -> watch::Receiver<CalendarViewState> {
        self.pipeline.state.subscribe()
    }

    pub fn with_state<R>(&self, read: impl FnOnce(&CalendarViewState) -> R) -> R {
        read(&self.pipeline.state.borrow())
    }

    pub fn current_user(&self) -> User {
        self.user.borrow().clone()
    }

    /// Switch the viewing user. Cached entries were filtered for the previous
    /// user, so the cache and all live day subscriptions are dropped.
    pub fn set_user(&self, user: User) {
        self.stop_live_days();
        self.user.send_replace(user);
        self.pipeline.apply(CacheUpdate::Clear);
    }

    /// Load `range` once. Dates already loaded stay loaded while the fetch
    /// runs; `force` marks them loading again.
    ///
    /// # Errors
    /// Returns the fetch failure (or `Timeout`) after marking the range failed.
    pub async fn request_range(&self, range: DateRange, force: bool) -> Result<()> {
        let pipeline = &self.pipeline;
        pipeline.apply(CacheUpdate::Requested { range, force });
        let mut guard = SettleOnDrop {
            pipeline,
            range,
            armed: true,
        };

        let fetch = self.source.events_in_range(range, pipeline.tz);
        let result = with_timeout(self.fetch_timeout, fetch).await;
        guard.armed = false;
        match result {
            Ok(records) => {
                tracing::debug!(%range, records = records.len(), "range loaded");
                pipeline.apply_records(range, &records);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%range, %error, "range fetch failed");
                pipeline.fail(range, &error);
                Err(error)
            }
        }
    }

    pub async fn request_day(&self, date: NaiveDate) -> Result<()> {
        self.request_range(DateRange::day(date), false).await
    }

    pub async fn request_month(&self, year: i32, month: u32) -> Result<()> {
        self.request_range(DateRange::month(year, month)?, false).await
    }

    pub async fn request_week(&self, date: NaiveDate) -> Result<()> {
        self.request_range(DateRange::week_of(date, self.week_start), false)
            .await
    }

    pub async fn refresh_range(&self, range: DateRange) -> Result<()> {
        self.request_range(range, true).await
    }

    /// Keep `date` live: subscribe to its bookings and apply every snapshot
    /// until the controller is dropped or the user changes. Calling it again
    /// for a date already live is a no-op.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn watch_day(&self, date: NaiveDate) {
        let range = DateRange::day(date);
        self.pipeline.apply(CacheUpdate::Requested {
            range,
            force: false,
        });

        let mut live = self
            .live_days
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if live.get(&date).is_some_and(|task| !task.is_finished()) {
            return;
        }

        let source = Arc::clone(&self.source);
        let pipeline = self.pipeline.clone();
        let limit = self.fetch_timeout;
        let task = tokio::spawn(async move {
            follow_day(source, pipeline, date, limit).await;
        });
        live.insert(date, task);
    }

    pub fn live_day_count(&self) -> usize {
        self.live_days
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    fn stop_live_days(&self) {
        let mut live = self
            .live_days
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, task) in live.drain() {
            task.abort();
        }
    }
}

impl Drop for CalendarController {
    fn drop(&mut self) {
        self.stop_live_days();
    }
}

/// Apply every snapshot of the bookings touching `date`, including ones that
/// started earlier and run into it.
async fn follow_day(
    source: Arc<dyn EventSource>,
    pipeline: Pipeline,
    date: NaiveDate,
    limit: Duration,
) {
    let range = DateRange::day(date);
    let subscribe = source.subscribe_date(date, pipeline.tz);
    let mut subscription = match with_timeout(limit, subscribe).await {
        Ok(subscription) => subscription,
        Err(error) => {
            tracing::warn!(%date, %error, "day subscription failed");
            pipeline.fail(range, &error);
            return;
        }
    };

    // The first snapshot settles the Loading entry; later ones may take as long as they like.
    match tokio::time::timeout(limit, subscription.next_snapshot()).await {
        Ok(Some(records)) => pipeline.apply_records(range, &records),
        Ok(None) => {
            let closed = "subscription closed before first snapshot".to_string();
            pipeline.fail(range, &CalendarError::FetchFailure(closed));
            return;
        }
        Err(_) => {
            tracing::warn!(%date, ?limit, "no snapshot before timeout");
            pipeline.fail(range, &CalendarError::Timeout(limit));
            return;
        }
    }

    while let Some(records) = subscription.next_snapshot().await {
        tracing::debug!(%date, records = records.len(), "day snapshot");
        pipeline.apply_records(range, &records);
    }
}
