//! # appliance-calendar
//!
//! Layout and data plumbing for a shared-appliance booking calendar.
//!
//! Bookings that cross midnight are split into per-day segments, segments
//! are packed into non-overlapping columns for day views, and a per-date
//! cache keeps the visible bookings of the current user in sync with a live
//! booking store.
//!
//! ## Modules
//!
//! - [`split`] — bookings → per-day [`PositionedEvent`] segments
//! - [`overlap`] — half-open overlap tests between segments
//! - [`arrange`] — greedy column assignment (`col`, `col_total`, `col_span`)
//! - [`conflict`] — time collisions with approved bookings
//! - [`freebusy`] — free time of an appliance within a window
//! - [`visibility`] — which bookings a user may see
//! - [`aggregate`] — stored records → resolved, visible, date-grouped bookings
//! - [`view_state`] — per-date `Loading` / `Loaded` / `Failed` cache
//! - [`controller`] — single writer of the cache, driven by an [`EventSource`]
//! - [`source`] — data-source port, live subscriptions, in-memory store
//! - [`service`] — booking operations with authorization and notices
//! - [`notify`] — notification port
//! - [`settings`] — timezone, timeouts and visibility configuration
//! - [`error`] — error types

pub mod aggregate;
pub mod arrange;
pub mod conflict;
pub mod controller;
pub mod error;
pub mod freebusy;
pub mod model;
pub mod notify;
pub mod overlap;
pub mod service;
pub mod settings;
pub mod source;
pub mod split;
pub mod time;
pub mod view_state;
pub mod visibility;

pub use aggregate::{group_by_date, Directory, EventAggregator, InMemoryDirectory};
pub use arrange::{arrange_events, layout_day, sort_for_layout};
pub use conflict::{find_booking_conflict, find_conflicts};
pub use controller::CalendarController;
pub use error::CalendarError;
pub use freebusy::{find_free_slots, FreeSlot};
pub use model::{
    Appliance, ApplianceId, BookingStatus, CalendarEvent, EventId, EventRecord, Role, Target, User,
    UserId,
};
pub use notify::{Notice, Notifier};
pub use overlap::overlaps;
pub use service::{BookingService, NewBooking};
pub use settings::Settings;
pub use source::{EventSource, MemoryEventSource, Subscription};
pub use split::{split_events, PositionedEvent, SplitType};
pub use time::{day_bounds, DateRange, TimeOfDay, TimeWindow};
pub use view_state::{CacheUpdate, CalendarViewState, EventsState};
pub use visibility::{Audience, VisibilityPolicy};

