//! Gift DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// DTO to insert a new gift (id and created_at are assigned by the backend)
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateGiftDTO {
    #[validate(length(min = 1, max = 200, message = "Gift name must be between 1 and 200 characters"))]
    pub name: String,
    pub is_taken: bool,
}

impl CreateGiftDTO {
    /// A suggested gift, not yet reserved
    pub fn suggestion(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            is_taken: false,
        }
    }
}

/// Partial update of a gift, only `Some` fields are sent
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateGiftDTO {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_taken: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_by: Option<String>,
}

impl UpdateGiftDTO {
    pub fn reserve() -> Self {
        Self {
            is_taken: Some(true),
            ..Default::default()
        }
    }
}
