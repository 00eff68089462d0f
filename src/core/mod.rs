//! Core Module - infrastructure shared by the whole crate
//!
//! - Configuration
//! - Error handling
//! - Application state

pub mod config;
pub mod error;
pub mod state;

pub use config::{Config, Credentials};
pub use error::{BackendError, ErrorKind, PostgrestErrorBody, SyncError};
pub use state::AppState;
