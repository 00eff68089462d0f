//! Backend module - the single handle used for every read, write and
//! subscription against the hosted database
//!
//! [`Backend`] is the seam: view-models and repositories are generic over it,
//! production code passes a [`Connector`], tests pass a [`MemoryBackend`].

pub mod connector;
pub mod memory;
pub mod rest;

pub use connector::Connector;
pub use memory::{MemoryBackend, Operation};
pub use rest::RestClient;

use crate::core::BackendError;
use crate::dtos::{ChangeEvent, SelectQuery};
use crate::entities::Table;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Callback run for every change event of a subscribed table
pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Returned by [`Backend::subscribe`], hand it back to [`Backend::unsubscribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub table: Table,
}

/// Row level access to the backend tables
///
/// Rows are JSON objects; typing happens in the repositories.
pub trait Backend: Send + Sync + 'static {
    /// Reads the rows of `table` matching `query`, in the requested order
    fn select(
        &self,
        table: Table,
        query: &SelectQuery,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Inserts one row and returns it as stored (id, defaults, created_at)
    fn insert(
        &self,
        table: Table,
        row: Value,
    ) -> impl Future<Output = Result<Value, BackendError>> + Send;

    /// Applies `patch` to the row with primary key `id`
    fn update(
        &self,
        table: Table,
        id: i64,
        patch: Value,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Runs `on_change` for every insert, update or delete on `table`
    fn subscribe(
        &self,
        table: Table,
        on_change: ChangeCallback,
    ) -> impl Future<Output = Result<SubscriptionHandle, BackendError>> + Send;

    /// Stops a subscription; unknown handles are ignored
    fn unsubscribe(&self, handle: SubscriptionHandle) -> impl Future<Output = ()> + Send;
}
