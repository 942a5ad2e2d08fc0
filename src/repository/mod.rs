//! Repository layer: durable storage of patrons, titles and reservations
//!
//! The [`Store`] trait is the only persistence surface the services see. A
//! [`StoreTx`] is an open transaction; it is committed or rolled back
//! explicitly, and dropping it without committing discards its writes.

pub mod memory;
pub mod postgres;

use std::{future::Future, pin::Pin};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Patron, Reservation, Title};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Low-level persistence failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    /// Numeric value does not fit its column
    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("row not found: {0}")]
    NotFound(String),

    /// Serialization failure or deadlock; the whole transaction may be retried
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Future returned by a transaction body
pub type TxFuture<'t, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 't>>;

/// Handle to a durable store
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// All titles ordered by id
    async fn list_titles(&self) -> StoreResult<Vec<Title>>;

    /// All patrons ordered by id
    async fn list_patrons(&self) -> StoreResult<Vec<Patron>>;

    /// All active reservations ordered by `created_at`, then id
    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>>;

    /// Reservations held by the patron with this email, oldest first,
    /// read from one snapshot. `None` if no patron has the email.
    async fn patron_reservations(&self, email: &str) -> StoreResult<Option<Vec<Reservation>>>;

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Operations available inside one transaction
#[async_trait]
pub trait StoreTx: Send {
    async fn find_patron_by_email(&mut self, email: &str) -> StoreResult<Option<Patron>>;

    /// Fails with `UniqueViolation` if the email is taken
    async fn insert_patron(&mut self, name: &str, email: &str) -> StoreResult<Patron>;

    /// Look up a title by natural key, locking the row until the transaction ends
    async fn find_title(&mut self, title: &str, author: &str) -> StoreResult<Option<Title>>;

    /// Fails with `UniqueViolation` if the `(title, author)` pair exists
    async fn insert_title(&mut self, title: &str, author: &str, copies: i64) -> StoreResult<Title>;

    /// Add `delta` to `copies_available`.
    ///
    /// Fails with `NotFound` if the id is absent, with `CheckViolation`
    /// if the result would be negative and with `OutOfRange` if it overflows.
    async fn update_title_copies(&mut self, id: i64, delta: i64) -> StoreResult<Title>;

    /// Fails with `ForeignKeyViolation` if the patron or title is absent
    async fn insert_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Reservation>;

    /// Oldest reservation by `created_at`, ties broken by lowest id
    async fn find_oldest_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
    ) -> StoreResult<Option<Reservation>>;

    /// Fails with `NotFound` if the row is already gone
    async fn delete_reservation(&mut self, id: i64) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Run `f` inside one transaction.
///
/// Commits when `f` succeeds and rolls back when it fails. If the returned
/// future is dropped early, the transaction is dropped with it and nothing
/// is published.
pub async fn with_transaction<T, E, F>(store: &dyn Store, f: F) -> Result<T, E>
where
    E: From<StoreError>,
    F: for<'t> FnOnce(&'t mut dyn StoreTx) -> TxFuture<'t, T, E>,
{
    let mut tx = store.begin().await?;

    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
