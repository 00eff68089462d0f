//! Application State - the two view-models over one shared backend

use crate::backend::Backend;
use crate::realtime::LiveUpdateListener;
use crate::viewmodels::{GiftRegistry, Rsvp};
use std::sync::Arc;

/// Everything the page needs, shared between the console loop and the live
/// update workers
pub struct AppState<B: Backend> {
    pub backend: Arc<B>,

    /// Gift registry section
    pub gifts: Arc<GiftRegistry<B>>,

    /// RSVP form and guest book
    pub rsvp: Arc<Rsvp<B>>,
}

impl<B: Backend> AppState<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            gifts: Arc::new(GiftRegistry::new(backend.clone())),
            rsvp: Arc::new(Rsvp::new(backend.clone())),
            backend,
        }
    }

    /// Subscribes both view-models to live updates and performs the initial
    /// load
    pub async fn mount(&self) -> LiveUpdateListener<B> {
        LiveUpdateListener::mount(self.backend.clone(), self.gifts.clone(), self.rsvp.clone()).await
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gifts: self.gifts.clone(),
            rsvp: self.rsvp.clone(),
        }
    }
}
