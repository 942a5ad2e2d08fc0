//! Patron model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Registered library user, identified by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Patron {
    pub id: i64,
    pub name: String,
    /// Unique, matched case-sensitively
    pub email: String,
}

/// Register patron request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewPatron {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "email must not be empty"))]
    pub email: String,
}
