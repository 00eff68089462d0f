//! Change notification DTOs
//!
//! `ChangeEvent` is what subscribers receive. `PhoenixMessage` is the frame
//! format of the realtime websocket:
//! { "topic": "realtime:gifts-changes", "event": "postgres_changes", "payload": { ... }, "ref": null }

use crate::entities::Table;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Events may have been missed (lag, reconnect); refetch everything
    Resync,
}

/// "Something changed in this table", without the row itself
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind) -> Self {
        Self { table, kind }
    }

    pub fn resync(table: Table) -> Self {
        Self::new(table, ChangeKind::Resync)
    }
}

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl PhoenixMessage {
    pub fn topic_for(table: Table) -> String {
        format!("realtime:{table}-changes")
    }

    pub fn join(table: Table, reference: String) -> Self {
        Self {
            topic: Self::topic_for(table),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "postgres_changes": [
                        { "event": "*", "schema": "public", "table": table.as_str() }
                    ]
                }
            }),
            reference: Some(reference),
        }
    }

    pub fn leave(table: Table, reference: String) -> Self {
        Self {
            topic: Self::topic_for(table),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference),
        }
    }

    pub fn heartbeat(reference: String) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference),
        }
    }

    /// Maps a `postgres_changes` frame to a change event, `None` for every
    /// other frame
    pub fn change_event(&self) -> Option<ChangeEvent> {
        if self.event != EVENT_POSTGRES_CHANGES {
            return None;
        }
        let data = self.payload.get("data")?;
        let table = data.get("table")?.as_str()?.parse::<Table>().ok()?;
        let kind = match data.get("type")?.as_str()? {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => return None,
        };
        Some(ChangeEvent::new(table, kind))
    }
}
