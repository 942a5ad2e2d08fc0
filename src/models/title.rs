//! Title (catalog entry) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Catalog entry with a shared pool of lendable copies.
///
/// `(title, author)` is the natural key: registering the same pair again
/// adds copies to the existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Title {
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Never negative in a committed state
    pub copies_available: i64,
}

/// Add title (or copies) request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewTitle {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "author must not be empty"))]
    pub author: String,
    #[validate(range(min = 0, message = "copies must not be negative"))]
    pub copies: i64,
}
