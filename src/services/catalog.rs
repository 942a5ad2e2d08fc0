//! Read-only catalog queries

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Patron, Reservation, Title},
    repository::Store,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All titles, ordered by id
    pub async fn list_titles(&self) -> AppResult<Vec<Title>> {
        Ok(self.store.list_titles().await?)
    }

    /// All patrons, ordered by id
    pub async fn list_patrons(&self) -> AppResult<Vec<Patron>> {
        Ok(self.store.list_patrons().await?)
    }

    /// Active reservations, oldest first
    pub async fn list_reservations(&self) -> AppResult<Vec<Reservation>> {
        Ok(self.store.list_reservations().await?)
    }

    /// Active reservations held by one patron, oldest first
    pub async fn patron_reservations(&self, email: &str) -> AppResult<Vec<Reservation>> {
        self.store
            .patron_reservations(email)
            .await?
            .ok_or_else(|| AppError::NotFound("patron".to_string()))
    }

    /// Whether the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        Ok(self.store.ping().await?)
    }
}
