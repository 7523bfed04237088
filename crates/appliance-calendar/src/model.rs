//! Booking domain types: users, appliances, calendar events and their persisted form.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a booking.
    EventId
);
string_id!(
    /// Identifier of a user account.
    UserId
);
string_id!(
    /// Identifier of a bookable appliance.
    ApplianceId
);

/// What an operation was refused access to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Booking(EventId),
    Appliance(ApplianceId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Booking(id) => write!(f, "booking {id}"),
            Target::Appliance(id) => write!(f, "appliance {id}"),
        }
    }
}

/// Approval state of a booking.
///
/// Persisted as `NONE` / `APPROVED` / `DECLINED`; `NONE` means the booking is
/// still waiting for a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    #[serde(rename = "NONE")]
    Pending,
    Approved,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            role,
        }
    }

    /// Stand-in for a user id the directory could not resolve.
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            role: Role::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins, the appliance owner and its superusers manage the appliance's bookings.
    pub fn can_manage(&self, appliance: &Appliance) -> bool {
        self.is_admin() || appliance.owner == self.id || appliance.superuser_ids.contains(&self.id)
    }

    pub fn can_manage_event(&self, event: &CalendarEvent) -> bool {
        self.can_manage(&event.appliance)
    }
}

/// Display color used for appliances without one.
pub const DEFAULT_APPLIANCE_COLOR: u32 = 0xFFFF_FFFF;

fn default_color() -> u32 {
    DEFAULT_APPLIANCE_COLOR
}

/// A shared bookable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appliance {
    pub id: ApplianceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// ARGB display color.
    #[serde(default = "default_color")]
    pub color: u32,
    #[serde(default)]
    pub owner: UserId,
    #[serde(default)]
    pub superuser_ids: Vec<UserId>,
    #[serde(default)]
    pub user_ids: Vec<UserId>,
}

impl Appliance {
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner: UserId) -> Self {
        Self {
            id: ApplianceId::new(id),
            name: name.into(),
            description: String::new(),
            color: DEFAULT_APPLIANCE_COLOR,
            owner,
            superuser_ids: Vec::new(),
            user_ids: Vec::new(),
        }
    }

    /// Stand-in for an appliance id the directory could not resolve.
    pub fn placeholder(id: ApplianceId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            color: DEFAULT_APPLIANCE_COLOR,
            owner: UserId::default(),
            superuser_ids: Vec::new(),
            user_ids: Vec::new(),
        }
    }

    /// Whether the user shares this appliance as owner, superuser or regular user.
    pub fn is_member(&self, user: &UserId) -> bool {
        self.owner == *user || self.superuser_ids.contains(user) || self.user_ids.contains(user)
    }
}

/// A booking with its user and appliance references resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub appliance: Appliance,
    pub user: User,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub commentary: Option<String>,
    #[serde(default)]
    pub manager_commentary: Option<String>,
    #[serde(default)]
    pub managed_by: Option<UserId>,
    #[serde(default)]
    pub managed_time: Option<DateTime<Utc>>,
}

/// A booking as stored by the data source, with user and appliance by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub user_id: UserId,
    pub appliance_id: ApplianceId,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    /// Start date of the booking, the key used by per-date queries.
    pub date: NaiveDate,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub commentary: Option<String>,
    #[serde(default)]
    pub manager_commentary: Option<String>,
    #[serde(default)]
    pub managed_by_id: Option<UserId>,
    #[serde(default)]
    pub managed_time: Option<DateTime<Utc>>,
}

/// Field updates for a stored booking. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub status: Option<BookingStatus>,
    pub commentary: Option<String>,
    pub manager_commentary: Option<String>,
    pub managed_by_id: Option<UserId>,
    pub managed_time: Option<DateTime<Utc>>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
}

impl EventPatch {
    pub fn apply(&self, record: &mut EventRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(commentary) = &self.commentary {
            record.commentary = Some(commentary.clone());
        }
        if let Some(commentary) = &self.manager_commentary {
            record.manager_commentary = Some(commentary.clone());
        }
        if let Some(manager) = &self.managed_by_id {
            record.managed_by_id = Some(manager.clone());
        }
        if let Some(time) = self.managed_time {
            record.managed_time = Some(time);
        }
        if let Some(start) = self.time_start {
            record.time_start = start;
        }
        if let Some(end) = self.time_end {
            record.time_end = end;
        }
        if let Some(date) = self.date {
            record.date = date;
        }
    }
}

/// Common view over resolved and stored bookings, used by time checks.
pub trait Booking {
    fn id(&self) -> &EventId;
    fn appliance_id(&self) -> &ApplianceId;
    fn status(&self) -> BookingStatus;
    fn time_start(&self) -> DateTime<Utc>;
    fn time_end(&self) -> DateTime<Utc>;
}

impl Booking for CalendarEvent {
    fn id(&self) -> &EventId {
        &self.id
    }
    fn appliance_id(&self) -> &ApplianceId {
        &self.appliance.id
    }
    fn status(&self) -> BookingStatus {
        self.status
    }
    fn time_start(&self) -> DateTime<Utc> {
        self.time_start
    }
    fn time_end(&self) -> DateTime<Utc> {
        self.time_end
    }
}

impl Booking for EventRecord {
    fn id(&self) -> &EventId {
        &self.id
    }
    fn appliance_id(&self) -> &ApplianceId {
        &self.appliance_id
    }
    fn status(&self) -> BookingStatus {
        self.status
    }
    fn time_start(&self) -> DateTime<Utc> {
        self.time_start
    }
    fn time_end(&self) -> DateTime<Utc> {
        self.time_end
    }
}
