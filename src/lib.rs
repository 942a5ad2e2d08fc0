//! Lending library reservation engine
//!
//! Keeps each title's available copies consistent with its active
//! reservations under concurrent access, and exposes the engine through a
//! small REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn repository::Store>) -> Self {
        let services = services::Services::new(store, &config.engine);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
