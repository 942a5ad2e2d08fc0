//! REST endpoints over the reservation services

pub mod health;
pub mod openapi;
pub mod patrons;
pub mod reservations;
pub mod titles;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Patrons
        .route("/patrons", get(patrons::list_patrons).post(patrons::register_patron))
        .route("/patrons/:email/reservations", get(patrons::patron_reservations))
        // Titles
        .route("/titles", get(titles::list_titles).post(titles::upsert_title))
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/reservations/cancel", post(reservations::cancel_reservation))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
