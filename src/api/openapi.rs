//! OpenAPI documentation

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api::{health, patrons, reservations, titles};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Reservations API",
        version = "0.1.0",
        description = "Patrons, titles and reservations of a lending library"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Patrons
        patrons::list_patrons,
        patrons::register_patron,
        patrons::patron_reservations,
        // Titles
        titles::list_titles,
        titles::upsert_title,
        // Reservations
        reservations::list_reservations,
        reservations::create_reservation,
        reservations::cancel_reservation,
    ),
    components(
        schemas(
            health::HealthResponse,
            crate::models::Patron,
            crate::models::NewPatron,
            crate::models::Title,
            crate::models::NewTitle,
            crate::models::Reservation,
            crate::models::ReservationRequest,
            crate::error::ErrorKind,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health checks"),
        (name = "patrons", description = "Patron registration"),
        (name = "titles", description = "Catalog titles and copies"),
        (name = "reservations", description = "Reserving and releasing copies")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON
pub fn create_openapi_router() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
