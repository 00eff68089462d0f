//! Wedding site data sync
//!
//! Keeps the gift registry and the RSVP guest list of the site in sync with
//! the hosted tables, both through explicit fetches and live change events.

pub mod backend;
pub mod core;
pub mod dtos;
pub mod entities;
pub mod realtime;
pub mod repositories;
pub mod viewmodels;

pub use backend::{Backend, Connector, MemoryBackend};
pub use core::{AppState, BackendError, Config, ErrorKind, SyncError};
pub use realtime::LiveUpdateListener;
pub use viewmodels::{GiftRegistry, Rsvp};
