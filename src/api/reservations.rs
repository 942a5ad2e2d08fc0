//! Reservation endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{Reservation, ReservationRequest},
};

/// List active reservations, oldest first
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    responses(
        (status = 200, description = "Active reservations", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.services.catalog.list_reservations().await?;
    Ok(Json(reservations))
}

/// Reserve one copy of a title
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 404, description = "Patron or title not found"),
        (status = 422, description = "No copies available")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    Json(request): Json<ReservationRequest>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state
        .services
        .reservations
        .create_reservation(&request.email, &request.author, &request.title)
        .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Cancel the patron's oldest reservation of a title
#[utoipa::path(
    post,
    path = "/reservations/cancel",
    tag = "reservations",
    request_body = ReservationRequest,
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 404, description = "Patron, title or reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    Json(request): Json<ReservationRequest>,
) -> AppResult<StatusCode> {
    state
        .services
        .reservations
        .cancel_oldest_reservation(&request.email, &request.author, &request.title)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
