use crate::dtos::ChangeEvent;
use crate::entities::Table;
use crate::realtime::FEED_CHANNEL_CAPACITY;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{debug, instrument, trace};

/// Fan-out of change notifications, one broadcast channel per table
pub struct ChangeFeed {
    channels: DashMap<Table, Sender<Arc<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        ChangeFeed {
            channels: DashMap::new(),
        }
    }

    #[instrument(skip(self))]
    pub fn subscribe(&self, table: Table) -> Receiver<Arc<ChangeEvent>> {
        match self.channels.get(&table) {
            Some(tx) => tx.value().subscribe(),
            None => {
                debug!("Creating broadcast channel for table");
                // entry() so that two racing subscribers end up on the same sender
                self.channels
                    .entry(table)
                    .or_insert_with(|| broadcast::channel(FEED_CHANNEL_CAPACITY).0)
                    .subscribe()
            }
        }
    }

    /// Delivers the event to every receiver of its table, returns how many
    /// were reached
    #[instrument(skip(self), fields(table = %event.table, kind = ?event.kind))]
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.channels.get(&event.table) {
            Some(tx) => match tx.send(Arc::new(event)) {
                Ok(n) => {
                    trace!(receivers = n, "Change broadcast");
                    n
                }
                Err(_) => {
                    trace!("No active receivers for change");
                    0
                }
            },
            None => 0,
        }
    }

    pub fn receiver_count(&self, table: Table) -> usize {
        self.channels
            .get(&table)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
