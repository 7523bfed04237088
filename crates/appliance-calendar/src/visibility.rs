//! Which bookings a user may see.
//!
//! All role checks funnel through [`VisibilityPolicy::is_visible`]; callers
//! never filter on roles themselves.

use serde::{Deserialize, Serialize};

use crate::model::{BookingStatus, CalendarEvent, User};

/// Who besides authors and managers may see shared bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Every signed-in user.
    Everyone,
    /// Owner, superusers and regular users of the booked appliance.
    #[default]
    ApplianceMembers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityPolicy {
    pub audience: Audience,
    pub pending_visible_to_members: bool,
    pub declined_visible_to_members: bool,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            audience: Audience::ApplianceMembers,
            pending_visible_to_members: true,
            declined_visible_to_members: false,
        }
    }
}

impl VisibilityPolicy {
    /// Authors see their bookings, managers see every booking of their
    /// appliance, and the audience sees bookings whose status is shared.
    pub fn is_visible(&self, user: &User, event: &CalendarEvent) -> bool {
        if event.user.id == user.id || user.can_manage(&event.appliance) {
            return true;
        }
        let in_audience = match self.audience {
            Audience::Everyone => true,
            Audience::ApplianceMembers => event.appliance.is_member(&user.id),
        };
        in_audience
            && match event.status {
                BookingStatus::Approved => true,
                BookingStatus::Pending => self.pending_visible_to_members,
                BookingStatus::Declined => self.declined_visible_to_members,
            }
    }

    pub fn retain_visible(&self, user: &User, events: &mut Vec<CalendarEvent>) {
        events.retain(|e| self.is_visible(user, e));
    }
}
