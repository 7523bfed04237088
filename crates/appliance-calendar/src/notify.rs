//! User-facing notices emitted by booking operations.
//!
//! Components that need to surface messages receive a [`Notifier`]
//! explicitly; there is no process-wide message bus.

use crate::model::{ApplianceId, BookingStatus, EventId, Target};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    BookingCreated(EventId),
    BookingCreateFailed,
    EventDeleted(EventId),
    EventDeleteFailed(EventId),
    ApplianceEventsDeleted { appliance: ApplianceId, count: usize },
    StatusChanged { event: EventId, status: BookingStatus },
    StatusChangeFailed(EventId),
    CommentaryUpdated(EventId),
    TimeUpdated(EventId),
    TimeNotFree { conflicting: EventId },
    NoUsersChosen,
    NotPermitted(Target),
    OperationFailed(String),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::info!(?notice, "notice");
    }
}
