//! Gift entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Gift {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_taken: bool,
    // modeled by the table, never written by the reservation flow
    #[serde(default)]
    pub reserved_by: Option<String>,
    #[serde(default, deserialize_with = "super::timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Gift {
    pub fn is_available(&self) -> bool {
        !self.is_taken
    }
}

/// Available/reserved counters shown above the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GiftStats {
    pub available: usize,
    pub reserved: usize,
}

impl GiftStats {
    pub fn from_gifts(gifts: &[Gift]) -> Self {
        let reserved = gifts.iter().filter(|g| g.is_taken).count();
        Self {
            available: gifts.len() - reserved,
            reserved,
        }
    }
}
