//! Title endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{NewTitle, Title},
};

/// List all titles with their available copies
#[utoipa::path(
    get,
    path = "/titles",
    tag = "titles",
    responses(
        (status = 200, description = "All titles", body = Vec<Title>)
    )
)]
pub async fn list_titles(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Title>>> {
    let titles = state.services.catalog.list_titles().await?;
    Ok(Json(titles))
}

/// Add a title, or add copies to an existing one
#[utoipa::path(
    post,
    path = "/titles",
    tag = "titles",
    request_body = NewTitle,
    responses(
        (status = 200, description = "Title after the upsert", body = Title),
        (status = 400, description = "Empty title/author or negative copies")
    )
)]
pub async fn upsert_title(
    State(state): State<crate::AppState>,
    Json(request): Json<NewTitle>,
) -> AppResult<Json<Title>> {
    let title = state
        .services
        .reservations
        .upsert_title(&request.title, &request.author, request.copies)
        .await?;

    Ok(Json(title))
}
