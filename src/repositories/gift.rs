//! GiftRepository - typed access to the `gifts` table

use super::{Create, ReadAll, Update, decode_row, decode_rows};
use crate::backend::Backend;
use crate::core::BackendError;
use crate::dtos::{CreateGiftDTO, SelectQuery, UpdateGiftDTO};
use crate::entities::{Gift, Table};
use std::sync::Arc;
use tracing::instrument;

pub struct GiftRepository<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> GiftRepository<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Marks the gift as taken
    #[instrument(skip(self))]
    pub async fn reserve(&self, id: i64) -> Result<(), BackendError> {
        self.update(&id, &UpdateGiftDTO::reserve()).await
    }
}

impl<B: Backend> ReadAll<Gift> for GiftRepository<B> {
    /// Registry order is by id
    async fn read_all(&self) -> Result<Vec<Gift>, BackendError> {
        let rows = self
            .backend
            .select(Table::Gifts, &SelectQuery::all().order_asc("id"))
            .await?;
        decode_rows(rows)
    }
}

impl<B: Backend> Create<Gift, CreateGiftDTO> for GiftRepository<B> {
    async fn create(&self, data: &CreateGiftDTO) -> Result<Gift, BackendError> {
        let row = self
            .backend
            .insert(Table::Gifts, serde_json::to_value(data)?)
            .await?;
        decode_row(row)
    }
}

impl<B: Backend> Update<UpdateGiftDTO, i64> for GiftRepository<B> {
    async fn update(&self, id: &i64, data: &UpdateGiftDTO) -> Result<(), BackendError> {
        self.backend
            .update(Table::Gifts, *id, serde_json::to_value(data)?)
            .await
    }
}
