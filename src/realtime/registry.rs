use crate::backend::{ChangeCallback, SubscriptionHandle};
use crate::dtos::ChangeEvent;
use crate::entities::Table;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, instrument, warn};

struct ActiveSubscription {
    table: Table,
    task: JoinHandle<()>,
}

/// Running subscriptions: one task per handle forwarding feed events to the
/// subscriber's callback
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    active: DashMap<u64, ActiveSubscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            next_id: AtomicU64::new(1),
            active: DashMap::new(),
        }
    }

    /// Spawns the forwarding task. Must be called inside a tokio runtime.
    #[instrument(skip(self, rx, on_change))]
    pub fn attach(
        &self,
        table: Table,
        rx: Receiver<Arc<ChangeEvent>>,
        on_change: ChangeCallback,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(forward(id, table, rx, on_change));
        self.active.insert(id, ActiveSubscription { table, task });
        info!(subscription_id = id, "Subscribed to changes");
        SubscriptionHandle { id, table }
    }

    /// Stops the subscription. Returns false for unknown or already removed
    /// handles.
    #[instrument(skip(self), fields(subscription_id = handle.id, table = %handle.table))]
    pub fn detach(&self, handle: &SubscriptionHandle) -> bool {
        match self.active.remove(&handle.id) {
            Some((_, sub)) => {
                sub.task.abort();
                info!("Unsubscribed from changes");
                true
            }
            None => {
                debug!("Unknown subscription handle");
                false
            }
        }
    }

    /// Number of live subscriptions on a table
    pub fn count(&self, table: Table) -> usize {
        self.active.iter().filter(|e| e.value().table == table).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn detach_all(&self) {
        self.active.retain(|_, sub| {
            sub.task.abort();
            false
        });
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.detach_all();
    }
}

async fn forward(
    id: u64,
    table: Table,
    rx: Receiver<Arc<ChangeEvent>>,
    on_change: ChangeCallback,
) {
    let mut stream = BroadcastStream::new(rx);
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => on_change(*event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                // A full refetch covers whatever was dropped
                warn!(subscription_id = id, skipped, "Subscriber lagged, requesting resync");
                on_change(ChangeEvent::resync(table));
            }
        }
    }
    debug!(subscription_id = id, "Change feed closed");
}
