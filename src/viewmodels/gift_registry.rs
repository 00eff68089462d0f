//! Gift Registry View-Model
//!
//! Reservations are optimistic: the local entry flips to taken before the
//! update is sent and flips back if the backend refuses it, unless a fetch
//! started in the meantime: that fetch already holds the backend's value
//! and the local entry is left to it. Two guests racing
//! for the same gift both see success locally; the refetch triggered by the
//! change notification converges them to the backend's state.

use super::{LiveCollection, LoadPhase, Lifecycle};
use crate::backend::Backend;
use crate::core::{ErrorKind, SyncError};
use crate::dtos::CreateGiftDTO;
use crate::entities::{Gift, GiftStats, Table};
use crate::repositories::{Create, GiftRepository, ReadAll};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

pub const EMPTY_GIFT_NAME: &str = "Please enter a gift name";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GiftRegistryState {
    pub phase: LoadPhase,
    pub gifts: Vec<Gift>,
    pub error: Option<String>,
    /// A suggested gift is being inserted
    pub adding: bool,
}

impl GiftRegistryState {
    pub fn stats(&self) -> GiftStats {
        GiftStats::from_gifts(&self.gifts)
    }

    pub fn gift(&self, id: i64) -> Option<&Gift> {
        self.gifts.iter().find(|g| g.id == id)
    }

    /// Loaded without error and nothing in the registry yet
    pub fn is_empty(&self) -> bool {
        self.phase == LoadPhase::Loaded && self.error.is_none() && self.gifts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    Reserved,
    /// Already taken locally, nothing was sent
    AlreadyTaken,
    /// The backend refused, the optimistic change was reverted unless a
    /// newer fetch had already replaced it
    Failed(ErrorKind),
    Detached,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(Gift),
    /// Rejected locally, nothing was sent
    Rejected,
    Failed(ErrorKind),
    Detached,
}

pub struct GiftRegistry<B: Backend> {
    repo: GiftRepository<B>,
    state: watch::Sender<GiftRegistryState>,
    lifecycle: Lifecycle,
}

impl<B: Backend> GiftRegistry<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(GiftRegistryState::default());
        Self {
            repo: GiftRepository::new(backend),
            state,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn snapshot(&self) -> GiftRegistryState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<GiftRegistryState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> GiftStats {
        self.state.borrow().stats()
    }

    pub fn detach(&self) {
        self.lifecycle.detach();
    }

    /// Reloads the whole registry, replacing the cached list
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) {
        if !self.lifecycle.is_attached() {
            return;
        }
        let generation = self.lifecycle.next_generation();
        self.state.send_modify(|s| {
            s.phase = LoadPhase::Loading;
            s.error = None;
        });
        debug!(generation, "Fetching gifts");

        let result = self.repo.read_all().await;

        if !self.lifecycle.is_current(generation) {
            debug!(generation, "Discarding stale gift fetch");
            return;
        }
        match result {
            Ok(gifts) => {
                info!(count = gifts.len(), "Gifts fetched");
                self.state.send_modify(|s| {
                    s.gifts = gifts;
                    s.phase = LoadPhase::Loaded;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch gifts");
                self.state.send_modify(|s| {
                    s.phase = LoadPhase::Failed;
                    s.error = Some(format!("Database error: {}", e.message));
                });
            }
        }
    }

    /// Reserves a gift, optimistically
    #[instrument(skip(self))]
    pub async fn reserve(&self, id: i64) -> ReserveOutcome {
        if !self.lifecycle.is_attached() {
            return ReserveOutcome::Detached;
        }

        let local = self
            .state
            .borrow()
            .gift(id)
            .map(|g| (g.name.clone(), g.is_taken));
        let name = match local {
            Some((_, true)) => {
                debug!("Gift already reserved, ignoring");
                return ReserveOutcome::AlreadyTaken;
            }
            Some((name, false)) => name,
            None => format!("gift #{id}"),
        };

        // applied before the request is sent
        let generation = self.lifecycle.generation();
        self.set_taken(id, true);
        info!(gift = %name, "Reserving gift");

        let result = self.repo.reserve(id).await;

        if !self.lifecycle.is_attached() {
            return ReserveOutcome::Detached;
        }
        match result {
            Ok(()) => {
                info!(gift = %name, "Gift reserved successfully");
                self.state.send_modify(|s| s.error = None);
                ReserveOutcome::Reserved
            }
            Err(e) => {
                let revert = self.lifecycle.generation() == generation;
                warn!(gift = %name, error = %e, revert, "Error reserving gift");
                self.state.send_modify(|s| {
                    if revert {
                        if let Some(g) = s.gifts.iter_mut().find(|g| g.id == id) {
                            g.is_taken = false;
                        }
                    }
                    s.error = Some(format!("Failed to reserve {name}: {}", e.message));
                });
                ReserveOutcome::Failed(e.kind())
            }
        }
    }

    /// Suggests a new gift. The list is refetched right after a successful
    /// insert instead of inserting locally.
    #[instrument(skip(self))]
    pub async fn add_custom(&self, name: &str) -> AddOutcome {
        if !self.lifecycle.is_attached() {
            return AddOutcome::Detached;
        }

        let trimmed = name.trim();
        if trimmed.is_empty() {
            self.state.send_modify(|s| s.error = Some(EMPTY_GIFT_NAME.to_string()));
            return AddOutcome::Rejected;
        }
        let dto = CreateGiftDTO::suggestion(trimmed);
        if let Err(e) = dto.validate() {
            let err = SyncError::from(e);
            self.state
                .send_modify(|s| s.error = Some(err.user_message().to_string()));
            return AddOutcome::Rejected;
        }

        self.state.send_modify(|s| {
            s.adding = true;
            s.error = None;
        });
        info!(gift = %trimmed, "Adding custom gift");

        let result = self.repo.create(&dto).await;

        if !self.lifecycle.is_attached() {
            return AddOutcome::Detached;
        }
        match result {
            Ok(gift) => {
                info!(gift_id = gift.id, "Custom gift added successfully");
                self.state.send_modify(|s| s.adding = false);
                self.fetch_all().await;
                AddOutcome::Added(gift)
            }
            Err(e) => {
                error!(error = %e, "Error adding custom gift");
                self.state.send_modify(|s| {
                    s.adding = false;
                    s.error = Some(format!("Failed to add \"{trimmed}\": {}", e.message));
                });
                AddOutcome::Failed(e.kind())
            }
        }
    }

    fn set_taken(&self, id: i64, taken: bool) {
        self.state.send_modify(|s| {
            if let Some(g) = s.gifts.iter_mut().find(|g| g.id == id) {
                g.is_taken = taken;
            }
        });
    }
}

impl<B: Backend> LiveCollection for GiftRegistry<B> {
    const TABLE: Table = Table::Gifts;

    fn refetch(&self) -> impl Future<Output = ()> + Send {
        self.fetch_all()
    }

    fn detach(&self) {
        self.lifecycle.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Operation};
    use serde_json::json;

    #[tokio::test]
    async fn failed_fetch_sets_database_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_offline(true);
        let registry = GiftRegistry::new(backend.clone());

        registry.fetch_all().await;
        let state = registry.snapshot();
        assert_eq!(state.phase, LoadPhase::Failed);
        assert!(state.error.unwrap().starts_with("Database error: "));
    }

    #[tokio::test]
    async fn watchers_see_updates() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .seed(Table::Gifts, vec![json!({ "name": "Kettle" })])
            .await
            .unwrap();
        let registry = GiftRegistry::new(backend.clone());
        let mut rx = registry.watch();

        registry.fetch_all().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().gifts.len(), 1);
    }

    #[tokio::test]
    async fn detached_registry_ignores_operations() {
        let backend = Arc::new(MemoryBackend::new());
        let registry = GiftRegistry::new(backend.clone());
        registry.detach();

        registry.fetch_all().await;
        assert_eq!(registry.reserve(1).await, ReserveOutcome::Detached);
        assert_eq!(registry.add_custom("Vase").await, AddOutcome::Detached);
        assert_eq!(backend.total_calls(), 0);
        assert_eq!(registry.snapshot().phase, LoadPhase::Idle);
    }

    #[tokio::test]
    async fn overlong_suggestion_is_rejected_locally() {
        let backend = Arc::new(MemoryBackend::new());
        let registry = GiftRegistry::new(backend.clone());

        let outcome = registry.add_custom(&"x".repeat(300)).await;
        assert_eq!(outcome, AddOutcome::Rejected);
        assert_eq!(backend.calls(Operation::Insert), 0);
        assert!(registry.snapshot().error.unwrap().contains("200"));
    }
}
