//! Patron endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{NewPatron, Patron, Reservation},
};

/// List all patrons
#[utoipa::path(
    get,
    path = "/patrons",
    tag = "patrons",
    responses(
        (status = 200, description = "All patrons", body = Vec<Patron>)
    )
)]
pub async fn list_patrons(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Patron>>> {
    let patrons = state.services.catalog.list_patrons().await?;
    Ok(Json(patrons))
}

/// Register a patron
#[utoipa::path(
    post,
    path = "/patrons",
    tag = "patrons",
    request_body = NewPatron,
    responses(
        (status = 201, description = "Patron registered", body = Patron),
        (status = 400, description = "Empty name or email"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_patron(
    State(state): State<crate::AppState>,
    Json(request): Json<NewPatron>,
) -> AppResult<(StatusCode, Json<Patron>)> {
    let patron = state
        .services
        .reservations
        .register_patron(&request.name, &request.email)
        .await?;

    Ok((StatusCode::CREATED, Json(patron)))
}

/// Active reservations of one patron
#[utoipa::path(
    get,
    path = "/patrons/{email}/reservations",
    tag = "patrons",
    params(
        ("email" = String, Path, description = "Patron email")
    ),
    responses(
        (status = 200, description = "Active reservations, oldest first", body = Vec<Reservation>),
        (status = 404, description = "Patron not found")
    )
)]
pub async fn patron_reservations(
    State(state): State<crate::AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.services.catalog.patron_reservations(&email).await?;
    Ok(Json(reservations))
}
