//! Reservation model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Active claim of one patron on one copy of a title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i64,
    pub patron_id: i64,
    pub title_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Reserve or cancel request, addressed by natural keys
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReservationRequest {
    #[validate(length(min = 1, message = "email must not be empty"))]
    pub email: String,
    #[validate(length(min = 1, message = "author must not be empty"))]
    pub author: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
}

impl ReservationRequest {
    pub fn new(email: &str, author: &str, title: &str) -> Self {
        Self {
            email: email.to_string(),
            author: author.to_string(),
            title: title.to_string(),
        }
    }
}
