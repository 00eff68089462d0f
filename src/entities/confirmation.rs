//! Confirmation entity - one RSVP per guest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::enums::Attendance;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub id: i64,
    pub name: String,
    pub attendance: Attendance,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// Head count per attendance answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub attending: usize,
    pub not_attending: usize,
    pub maybe: usize,
}

impl AttendanceSummary {
    pub fn from_confirmations(confirmations: &[Confirmation]) -> Self {
        confirmations
            .iter()
            .fold(Self::default(), |mut acc, c| {
                match c.attendance {
                    Attendance::Attending => acc.attending += 1,
                    Attendance::NotAttending => acc.not_attending += 1,
                    Attendance::Maybe => acc.maybe += 1,
                }
                acc
            })
    }

    pub fn total(&self) -> usize {
        self.attending + self.not_attending + self.maybe
    }
}
