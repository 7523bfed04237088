//! Booking operations: create, approve/decline, edit, move and delete.
//!
//! Every operation checks authorization and input before touching the data
//! source, and reports its outcome through the injected [`Notifier`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::conflict::{find_booking_conflict, SlotRequest};
use crate::error::{CalendarError, Result};
use crate::freebusy::{find_free_slots, FreeSlot};
use crate::model::{
    Appliance, BookingStatus, CalendarEvent, EventId, EventPatch, EventRecord, Target, User,
    UserId,
};
use crate::notify::{Notice, Notifier};
use crate::settings::Settings;
use crate::source::{with_timeout, EventSource};
use crate::time::day_bounds;

/// A booking request submitted by a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub appliance: Appliance,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub commentary: Option<String>,
}

pub struct BookingService {
    source: Arc<dyn EventSource>,
    notifier: Arc<dyn Notifier>,
    tz: Tz,
    fetch_timeout: Duration,
    bulk_delete_timeout: Duration,
}

impl BookingService {
    pub fn new(
        source: Arc<dyn EventSource>,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
    ) -> Result<Self> {
        Ok(Self {
            source,
            notifier,
            tz: settings.timezone()?,
            fetch_timeout: settings.fetch_timeout(),
            bulk_delete_timeout: settings.bulk_delete_timeout(),
        })
    }

    /// Store a new pending booking for `author`.
    ///
    /// # Errors
    /// `InvalidRange` for an empty range, `TimeConflict` when an approved
    /// booking of the appliance overlaps it, or the data-source failure.
    pub async fn create_booking(&self, author: &User, booking: NewBooking) -> Result<EventId> {
        let result = self.try_create(author, booking).await;
        self.report(result, |id| Notice::BookingCreated(id.clone()), |_| {
            Notice::BookingCreateFailed
        })
    }

    async fn try_create(&self, author: &User, booking: NewBooking) -> Result<EventId> {
        check_range(booking.time_start, booking.time_end)?;
        self.ensure_free(&booking.appliance, booking.time_start, booking.time_end, None)
            .await?;

        let id = EventId::new(uuid::Uuid::new_v4().to_string());
        let record = EventRecord {
            id: id.clone(),
            user_id: author.id.clone(),
            appliance_id: booking.appliance.id.clone(),
            time_start: booking.time_start,
            time_end: booking.time_end,
            date: self.local_date(booking.time_start),
            status: BookingStatus::Pending,
            commentary: booking.commentary,
            manager_commentary: None,
            managed_by_id: None,
            managed_time: None,
        };
        tracing::info!(
            event = %id,
            appliance = %record.appliance_id,
            user = %author.id,
            "creating booking"
        );
        with_timeout(self.fetch_timeout, self.source.create(record)).await?;
        Ok(id)
    }

    /// Approve or decline `event` on behalf of a manager.
    ///
    /// Approving is refused with `TimeConflict` if another approved booking
    /// of the appliance overlaps.
    pub async fn set_status(
        &self,
        actor: &User,
        event: &CalendarEvent,
        status: BookingStatus,
        manager_commentary: Option<String>,
    ) -> Result<()> {
        let result = self
            .try_set_status(actor, event, status, manager_commentary)
            .await;
        self.report(
            result,
            |_| Notice::StatusChanged {
                event: event.id.clone(),
                status,
            },
            |_| Notice::StatusChangeFailed(event.id.clone()),
        )
    }

    async fn try_set_status(
        &self,
        actor: &User,
        event: &CalendarEvent,
        status: BookingStatus,
        manager_commentary: Option<String>,
    ) -> Result<()> {
        require(actor.can_manage_event(event), actor, booking(event))?;
        if status == BookingStatus::Approved {
            self.ensure_free(&event.appliance, event.time_start, event.time_end, Some(&event.id))
                .await?;
        }
        let patch = EventPatch {
            status: Some(status),
            manager_commentary,
            managed_by_id: Some(actor.id.clone()),
            managed_time: Some(Utc::now()),
            ..EventPatch::default()
        };
        tracing::info!(event = %event.id, ?status, manager = %actor.id, "changing booking status");
        self.patch(&event.id, patch).await
    }

    pub async fn approve(
        &self,
        actor: &User,
        event: &CalendarEvent,
        commentary: Option<String>,
    ) -> Result<()> {
        self.set_status(actor, event, BookingStatus::Approved, commentary)
            .await
    }

    pub async fn decline(
        &self,
        actor: &User,
        event: &CalendarEvent,
        commentary: Option<String>,
    ) -> Result<()> {
        self.set_status(actor, event, BookingStatus::Declined, commentary)
            .await
    }

    /// The author withdraws their own booking; it stays on record as declined.
    pub async fn withdraw(&self, author: &User, event: &CalendarEvent) -> Result<()> {
        let result = async {
            require(event.user.id == author.id, author, booking(event))?;
            let patch = EventPatch {
                status: Some(BookingStatus::Declined),
                ..EventPatch::default()
            };
            self.patch(&event.id, patch).await
        }
        .await;
        self.report(
            result,
            |_| Notice::StatusChanged {
                event: event.id.clone(),
                status: BookingStatus::Declined,
            },
            |_| Notice::StatusChangeFailed(event.id.clone()),
        )
    }

    /// Replace the author's commentary. Only the author may do this.
    pub async fn update_commentary(
        &self,
        actor: &User,
        event: &CalendarEvent,
        text: String,
    ) -> Result<()> {
        let result = async {
            require(event.user.id == actor.id, actor, booking(event))?;
            let patch = EventPatch {
                commentary: Some(text),
                ..EventPatch::default()
            };
            self.patch(&event.id, patch).await
        }
        .await;
        self.report_commentary(result, event)
    }

    pub async fn update_manager_commentary(
        &self,
        actor: &User,
        event: &CalendarEvent,
        text: String,
    ) -> Result<()> {
        let result = async {
            require(actor.can_manage_event(event), actor, booking(event))?;
            let patch = EventPatch {
                manager_commentary: Some(text),
                ..EventPatch::default()
            };
            self.patch(&event.id, patch).await
        }
        .await;
        self.report_commentary(result, event)
    }

    /// Move `event` to `[start, end)`. Allowed for the author and managers.
    ///
    /// # Errors
    /// `TimeConflict` if the new range overlaps another approved booking of
    /// the same appliance; the booking is left unchanged.
    pub async fn update_time(
        &self,
        actor: &User,
        event: &CalendarEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let result = async {
            let allowed = event.user.id == actor.id || actor.can_manage_event(event);
            require(allowed, actor, booking(event))?;
            check_range(start, end)?;
            self.ensure_free(&event.appliance, start, end, Some(&event.id))
                .await?;
            let patch = EventPatch {
                time_start: Some(start),
                time_end: Some(end),
                date: Some(self.local_date(start)),
                ..EventPatch::default()
            };
            tracing::info!(event = %event.id, %start, %end, "moving booking");
            self.patch(&event.id, patch).await
        }
        .await;
        self.report(
            result,
            |_| Notice::TimeUpdated(event.id.clone()),
            |e| Notice::OperationFailed(e.to_string()),
        )
    }

    /// Shorten or extend `event` to end at `end`.
    pub async fn set_time_end(
        &self,
        actor: &User,
        event: &CalendarEvent,
        end: DateTime<Utc>,
    ) -> Result<()> {
        self.update_time(actor, event, event.time_start, end).await
    }

    pub async fn delete(&self, actor: &User, event: &CalendarEvent) -> Result<()> {
        let result = async {
            let allowed = event.user.id == actor.id || actor.can_manage_event(event);
            require(allowed, actor, booking(event))?;
            tracing::info!(event = %event.id, "deleting booking");
            with_timeout(self.fetch_timeout, self.source.delete(&event.id)).await
        }
        .await;
        self.report(
            result,
            |_| Notice::EventDeleted(event.id.clone()),
            |_| Notice::EventDeleteFailed(event.id.clone()),
        )
    }

    /// Delete every booking of `appliance`, bounded by the bulk-delete timeout.
    pub async fn delete_all_for_appliance(
        &self,
        actor: &User,
        appliance: &Appliance,
    ) -> Result<usize> {
        let result = async {
            let target = Target::Appliance(appliance.id.clone());
            require(actor.can_manage(appliance), actor, target)?;
            tracing::info!(appliance = %appliance.id, "deleting all bookings of appliance");
            with_timeout(
                self.bulk_delete_timeout,
                self.source.delete_all_for_appliance(&appliance.id),
            )
            .await
        }
        .await;
        self.report(
            result,
            |count| Notice::ApplianceEventsDeleted {
                appliance: appliance.id.clone(),
                count: *count,
            },
            |e| Notice::OperationFailed(e.to_string()),
        )
    }

    pub async fn has_bookings(&self, appliance: &Appliance) -> Result<bool> {
        with_timeout(self.fetch_timeout, self.source.has_any_event(&appliance.id)).await
    }

    /// Free time of `appliance` during the local day `date`.
    pub async fn free_slots(
        &self,
        appliance: &Appliance,
        date: NaiveDate,
    ) -> Result<Vec<FreeSlot>> {
        let (window_start, window_end) = day_bounds(date, &self.tz);
        let bookings = with_timeout(
            self.fetch_timeout,
            self.source.appliance_events_after(&appliance.id, window_start),
        )
        .await?;
        Ok(find_free_slots(&bookings, window_start, window_end))
    }

    /// Members of `appliance` once `selected` users are added.
    ///
    /// # Errors
    /// `Validation` when nothing is selected, also reported as
    /// [`Notice::NoUsersChosen`].
    pub fn member_ids_with(
        &self,
        appliance: &Appliance,
        selected: &[UserId],
    ) -> Result<Vec<UserId>> {
        merge_member_ids(&appliance.user_ids, selected)
            .inspect_err(|_| self.notifier.notify(Notice::NoUsersChosen))
    }

    async fn ensure_free(
        &self,
        appliance: &Appliance,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&EventId>,
    ) -> Result<()> {
        let existing = with_timeout(
            self.fetch_timeout,
            self.source.appliance_events_after(&appliance.id, start),
        )
        .await?;
        let request = SlotRequest {
            appliance_id: &appliance.id,
            start,
            end,
            exclude,
        };
        match find_booking_conflict(&request, &existing) {
            Some(conflicting) => Err(CalendarError::TimeConflict {
                conflicting: conflicting.id.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn patch(&self, id: &EventId, patch: EventPatch) -> Result<()> {
        with_timeout(self.fetch_timeout, self.source.update(id, patch)).await
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    fn report_commentary(&self, result: Result<()>, event: &CalendarEvent) -> Result<()> {
        self.report(
            result,
            |_| Notice::CommentaryUpdated(event.id.clone()),
            |e| Notice::OperationFailed(e.to_string()),
        )
    }

    /// Notify the outcome of an operation and hand the result back.
    ///
    /// Time conflicts and authorization refusals have dedicated notices;
    /// other failures use `on_error`.
    fn report<T>(
        &self,
        result: Result<T>,
        on_ok: impl FnOnce(&T) -> Notice,
        on_error: impl FnOnce(&CalendarError) -> Notice,
    ) -> Result<T> {
        let notice = match &result {
            Ok(value) => on_ok(value),
            Err(CalendarError::TimeConflict { conflicting }) => Notice::TimeNotFree {
                conflicting: conflicting.clone(),
            },
            Err(CalendarError::NotPermitted { target, .. }) => Notice::NotPermitted(target.clone()),
            Err(error) => on_error(error),
        };
        self.notifier.notify(notice);
        result
    }
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start < end {
        Ok(())
    } else {
        Err(CalendarError::InvalidRange { start, end })
    }
}

fn require(allowed: bool, user: &User, target: Target) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(CalendarError::NotPermitted {
            user: user.id.clone(),
            target,
        })
    }
}

fn booking(event: &CalendarEvent) -> Target {
    Target::Booking(event.id.clone())
}

/// Add `selected` users to an appliance's `existing` member list, without duplicates.
///
/// # Errors
/// `Validation` when nothing is selected; callers abort before any mutation.
pub fn merge_member_ids(existing: &[UserId], selected: &[UserId]) -> Result<Vec<UserId>> {
    if selected.is_empty() {
        return Err(CalendarError::Validation("no users chosen".to_string()));
    }
    let mut merged = Vec::with_capacity(existing.len() + selected.len());
    for id in selected.iter().chain(existing) {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    Ok(merged)
}
