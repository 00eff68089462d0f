//! Repositories module - one repository per table
//!
//! Repositories turn the backend's JSON rows into entities and DTOs into
//! rows. They hold no state besides the shared backend handle.

pub mod confirmation;
pub mod gift;
pub mod traits;

pub use traits::{Create, ReadAll, Update};

pub use confirmation::ConfirmationRepository;
pub use gift::GiftRepository;

use crate::core::BackendError;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, BackendError> {
    Ok(serde_json::from_value(row)?)
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(decode_row).collect()
}
