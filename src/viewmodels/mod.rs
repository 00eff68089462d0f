//! View-models - UI-facing state plus the operations the page calls
//!
//! State is published through a `tokio::sync::watch` channel: the
//! presentation layer renders `snapshot()` and re-renders whenever the
//! receiver from `watch()` changes. Operations never return errors; failures
//! end up in the state as messages.

pub mod gift_registry;
pub mod rsvp;

pub use gift_registry::{AddOutcome, GiftRegistry, GiftRegistryState, ReserveOutcome};
pub use rsvp::{Notice, Rsvp, RsvpForm, RsvpState, SubmitOutcome};

use crate::entities::Table;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Load state of a collection. Refetching re-enters `Loading` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// A collection kept in sync with one backend table
pub trait LiveCollection: Send + Sync + 'static {
    const TABLE: Table;

    /// Replaces the cached collection with the backend's current rows
    fn refetch(&self) -> impl Future<Output = ()> + Send;

    /// Stops applying results to the state (teardown)
    fn detach(&self);
}

/// Teardown flag and fetch generations shared by both view-models
#[derive(Debug)]
struct Lifecycle {
    attached: AtomicBool,
    generation: AtomicU64,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            attached: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Starts a fetch, returning its generation
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Generation of the most recently started fetch
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a fetch of `generation` may still write its result
    fn is_current(&self, generation: u64) -> bool {
        self.is_attached() && self.generation.load(Ordering::SeqCst) == generation
    }
}
