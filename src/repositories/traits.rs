//! Common repository traits
//!
//! Typed operations over the untyped backend rows.

use crate::core::BackendError;
use std::future::Future;

/// Trait for creating new entities
///
/// # Type Parameters
/// * `Entity` - Type of the returned entity (with ID assigned by the backend)
/// * `CreateDTO` - DTO for creation (without ID, will be automatically generated)
pub trait Create<Entity, CreateDTO> {
    /// Inserts a new entity
    ///
    /// # Returns
    /// * `Ok(Entity)` - Created entity with ID and defaults filled in by the backend
    /// * `Err(BackendError)` - Error during insertion (constraint violation, network, ...)
    fn create(&self, data: &CreateDTO) -> impl Future<Output = Result<Entity, BackendError>> + Send;
}

/// Trait for reading a whole collection in its display order
pub trait ReadAll<Entity> {
    /// # Returns
    /// * `Ok(Vec<Entity>)` - Every entity of the table (can be empty)
    /// * `Err(BackendError)` - Error during reading
    fn read_all(&self) -> impl Future<Output = Result<Vec<Entity>, BackendError>> + Send;
}

/// Trait for updating existing entities
///
/// # Type Parameters
/// * `UpdateDTO` - DTO for updating (only `Some` fields are sent)
/// * `Id` - Type of the primary key
pub trait Update<UpdateDTO, Id> {
    /// Applies the DTO to the entity with primary key `id`
    fn update(&self, id: &Id, data: &UpdateDTO) -> impl Future<Output = Result<(), BackendError>> + Send;
}
