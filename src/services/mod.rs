//! Business logic services

pub mod catalog;
pub mod reservations;

use std::sync::Arc;

use crate::{config::EngineConfig, repository::Store};

pub use reservations::{ReservationClock, ReservationsService, TransactionPolicy};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub reservations: reservations::ReservationsService,
    pub catalog: catalog::CatalogService,
}

impl Services {
    /// Create all services over one store handle
    pub fn new(store: Arc<dyn Store>, engine: &EngineConfig) -> Self {
        Self {
            reservations: reservations::ReservationsService::new(
                store.clone(),
                TransactionPolicy::from(engine),
            ),
            catalog: catalog::CatalogService::new(store),
        }
    }
}
