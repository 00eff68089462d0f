#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use wedding_sync::backend::{Backend, ChangeCallback, MemoryBackend, Operation, SubscriptionHandle};
use wedding_sync::dtos::SelectQuery;
use wedding_sync::entities::Table;
use wedding_sync::{AppState, BackendError};

/// Upper bound for anything the live update workers do in the background
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Memory backend with the two-gift registry used throughout the tests:
/// `1 Blender` (available) and `2 Towels` (reserved)
pub async fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .seed(
            Table::Gifts,
            vec![
                json!({ "name": "Blender", "is_taken": false }),
                json!({ "name": "Towels", "is_taken": true }),
            ],
        )
        .await
        .expect("Failed to seed gifts");
    backend
}

/// Page state over `backend`, not mounted
pub fn create_test_state(backend: Arc<MemoryBackend>) -> AppState<MemoryBackend> {
    AppState::new(backend)
}

/// Waits until the watched state satisfies `predicate`, panicking after
/// [`SETTLE_TIMEOUT`]
pub async fn wait_for<T>(rx: &mut watch::Receiver<T>, predicate: impl FnMut(&T) -> bool) {
    tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("Timed out waiting for state")
        .expect("State channel closed");
}

/// Polls `condition` until it holds, panicking after [`SETTLE_TIMEOUT`]
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition never became true");
}

// ============================================================
// Held responses
// ============================================================

/// A call parked by [`HoldingBackend::hold`]
pub struct Held {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl Held {
    /// Waits until the held call has its result and is parked
    pub async fn reached(&mut self) {
        tokio::time::timeout(SETTLE_TIMEOUT, &mut self.reached)
            .await
            .expect("Held call never arrived")
            .expect("Held call dropped");
    }

    /// Lets the parked call return its result
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

struct Parking {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Memory backend whose responses can be held back: a held call runs against
/// the memory backend right away but only returns once released, like a slow
/// network answer
pub struct HoldingBackend {
    pub inner: Arc<MemoryBackend>,
    parked: Mutex<Vec<(Operation, Parking)>>,
}

impl HoldingBackend {
    pub fn new(inner: Arc<MemoryBackend>) -> Arc<Self> {
        Arc::new(HoldingBackend {
            inner,
            parked: Mutex::new(Vec::new()),
        })
    }

    /// Holds the response of the next call of `operation`
    pub fn hold(&self, operation: Operation) -> Held {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.parked.lock().unwrap().push((
            operation,
            Parking {
                reached: reached_tx,
                release: release_rx,
            },
        ));
        Held {
            reached: reached_rx,
            release: release_tx,
        }
    }

    async fn respond<T>(&self, operation: Operation, result: T) -> T {
        let parking = {
            let mut parked = self.parked.lock().unwrap();
            parked
                .iter()
                .position(|(op, _)| *op == operation)
                .map(|i| parked.remove(i).1)
        };
        if let Some(parking) = parking {
            let _ = parking.reached.send(());
            let _ = parking.release.await;
        }
        result
    }
}

impl Backend for HoldingBackend {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, BackendError> {
        let result = self.inner.select(table, query).await;
        self.respond(Operation::Select, result).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, BackendError> {
        let result = self.inner.insert(table, row).await;
        self.respond(Operation::Insert, result).await
    }

    async fn update(&self, table: Table, id: i64, patch: Value) -> Result<(), BackendError> {
        let result = self.inner.update(table, id, patch).await;
        self.respond(Operation::Update, result).await
    }

    async fn subscribe(
        &self,
        table: Table,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, BackendError> {
        self.inner.subscribe(table, on_change).await
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner.unsubscribe(handle).await
    }
}
