//! ConfirmationRepository - typed access to the `confirmations` table

use super::{Create, ReadAll, decode_row, decode_rows};
use crate::backend::Backend;
use crate::core::BackendError;
use crate::dtos::{CreateConfirmationDTO, SelectQuery};
use crate::entities::{Confirmation, Table};
use std::sync::Arc;

pub struct ConfirmationRepository<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> ConfirmationRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: Backend> ReadAll<Confirmation> for ConfirmationRepository<B> {
    /// Newest confirmations first
    async fn read_all(&self) -> Result<Vec<Confirmation>, BackendError> {
        let rows = self
            .backend
            .select(
                Table::Confirmations,
                &SelectQuery::all().order_desc("created_at"),
            )
            .await?;
        decode_rows(rows)
    }
}

impl<B: Backend> Create<Confirmation, CreateConfirmationDTO> for ConfirmationRepository<B> {
    async fn create(&self, data: &CreateConfirmationDTO) -> Result<Confirmation, BackendError> {
        let row = self
            .backend
            .insert(Table::Confirmations, serde_json::to_value(data)?)
            .await?;
        decode_row(row)
    }
}
