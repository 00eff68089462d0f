//! Confirmation DTOs

use crate::entities::Attendance;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// DTO to insert an RSVP
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateConfirmationDTO {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,

    pub attendance: Attendance,

    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    pub message: Option<String>,
}

impl CreateConfirmationDTO {
    /// Trims the inputs, an empty message becomes `None`
    pub fn new(name: &str, attendance: Attendance, message: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            attendance,
            message: message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        }
    }
}
