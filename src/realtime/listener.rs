//! Live Update Listener
//!
//! Every change event on a table triggers a full refetch of the matching
//! collection. No debouncing: a burst of N changes costs N refetches, which is
//! fine for a guest list and gift registry.

use crate::backend::{Backend, ChangeCallback, SubscriptionHandle};
use crate::dtos::ChangeEvent;
use crate::viewmodels::{GiftRegistry, LiveCollection, Rsvp};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Keeps the gift registry and the RSVP list in sync with their tables.
///
/// Call [`teardown`](Self::teardown) when the page goes away. Dropping the
/// listener without it detaches the view-models at once and releases the
/// subscriptions from a background task.
pub struct LiveUpdateListener<B: Backend> {
    backend: Arc<B>,
    gifts: Arc<GiftRegistry<B>>,
    rsvp: Arc<Rsvp<B>>,
    subscriptions: Vec<SubscriptionHandle>,
    workers: Vec<JoinHandle<()>>,
}

impl<B: Backend> LiveUpdateListener<B> {
    /// Subscribes to both tables, then loads both collections once.
    ///
    /// Subscribing first means a change landing during the initial load still
    /// triggers a refetch afterwards.
    #[instrument(skip_all)]
    pub async fn mount(backend: Arc<B>, gifts: Arc<GiftRegistry<B>>, rsvp: Arc<Rsvp<B>>) -> Self {
        let mut listener = Self {
            backend,
            gifts: gifts.clone(),
            rsvp: rsvp.clone(),
            subscriptions: Vec::new(),
            workers: Vec::new(),
        };

        listener.watch(gifts.clone()).await;
        listener.watch(rsvp.clone()).await;

        tokio::join!(gifts.refetch(), rsvp.refetch());
        info!(
            subscriptions = listener.subscriptions.len(),
            "Live update listener mounted"
        );
        listener
    }

    async fn watch<C: LiveCollection>(&mut self, collection: Arc<C>) {
        let table = C::TABLE;
        let (tx, mut rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let on_change: ChangeCallback = Arc::new(move |event: ChangeEvent| {
            let _ = tx.send(event);
        });

        match self.backend.subscribe(table, on_change).await {
            Ok(handle) => self.subscriptions.push(handle),
            Err(e) => {
                warn!(%table, error = %e, "Live updates unavailable for table");
                return;
            }
        }

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                info!(table = %event.table, kind = ?event.kind, "Real-time update received");
                collection.refetch().await;
            }
        });
        self.workers.push(worker);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Unsubscribes both channels and detaches the view-models so that
    /// requests still in flight no longer touch their state
    #[instrument(skip_all)]
    pub async fn teardown(&mut self) {
        for handle in self.subscriptions.drain(..) {
            self.backend.unsubscribe(handle).await;
        }
        self.gifts.detach();
        self.rsvp.detach();
        for worker in self.workers.drain(..) {
            worker.abort();
        }
        info!("Live update listener torn down");
    }
}

impl<B: Backend> Drop for LiveUpdateListener<B> {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
        self.gifts.detach();
        self.rsvp.detach();
        if self.subscriptions.is_empty() {
            return;
        }

        let handles: Vec<SubscriptionHandle> = self.subscriptions.drain(..).collect();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let backend = self.backend.clone();
                runtime.spawn(async move {
                    for handle in handles {
                        backend.unsubscribe(handle).await;
                    }
                });
                debug!("Listener dropped without teardown, unsubscribing in background");
            }
            Err(_) => warn!(
                subscriptions = handles.len(),
                "Listener dropped outside a runtime, subscriptions left open"
            ),
        }
    }
}
