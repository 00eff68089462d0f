//! Enumerations used by the entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend tables this crate reads and writes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Gifts,
    Confirmations,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Gifts, Table::Confirmations];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Gifts => "gifts",
            Table::Confirmations => "confirmations",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gifts" => Ok(Table::Gifts),
            "confirmations" => Ok(Table::Confirmations),
            other => Err(format!("unknown table {other:?}")),
        }
    }
}

/// Answer given in an RSVP
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Attendance {
    Attending,
    NotAttending,
    Maybe,
}

impl Attendance {
    pub const ALL: [Attendance; 3] = [
        Attendance::Attending,
        Attendance::NotAttending,
        Attendance::Maybe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attendance::Attending => "attending",
            Attendance::NotAttending => "not_attending",
            Attendance::Maybe => "maybe",
        }
    }
}

impl fmt::Display for Attendance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attendance {
    type Err = String;

    /// Accepts the stored values; surrounding whitespace and case are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attending" => Ok(Attendance::Attending),
            "not_attending" => Ok(Attendance::NotAttending),
            "maybe" => Ok(Attendance::Maybe),
            "" => Err("no attendance selected".to_string()),
            other => Err(format!("unknown attendance {other:?}")),
        }
    }
}
