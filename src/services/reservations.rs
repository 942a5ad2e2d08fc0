//! Reservation engine
//!
//! Owns the conservation law: for every title, `copies_available` plus the
//! number of active reservations equals the copies ever registered. Every
//! mutation runs in one store transaction with the title row locked, is
//! retried on serialization conflicts and is bounded by a deadline.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    config::EngineConfig,
    error::{AppError, AppResult},
    models::{NewPatron, NewTitle, Patron, Reservation, ReservationRequest, Title},
    repository::{with_transaction, Store, StoreError, StoreTx, TxFuture},
};

/// Retry and deadline settings applied to every engine operation
#[derive(Debug, Clone)]
pub struct TransactionPolicy {
    /// Retries after the first attempt when the store reports a conflict
    pub max_retries: u32,
    /// Sleep before retry `n` is `retry_backoff * n`
    pub retry_backoff: Duration,
    /// Deadline for the whole operation, retries included
    pub timeout: Duration,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for TransactionPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            timeout: config.transaction_timeout(),
        }
    }
}

/// Source of reservation timestamps that never goes backwards
#[derive(Debug, Default)]
pub struct ReservationClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ReservationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = match *last {
            Some(previous) => Utc::now().max(previous),
            None => Utc::now(),
        };
        *last = Some(now);
        now
    }
}

/// Failure inside a transaction body
#[derive(Debug)]
enum TxError {
    Store(StoreError),
    Rejected(AppError),
}

impl From<StoreError> for TxError {
    fn from(err: StoreError) -> Self {
        TxError::Store(err)
    }
}

impl From<AppError> for TxError {
    fn from(err: AppError) -> Self {
        TxError::Rejected(err)
    }
}

#[derive(Clone)]
pub struct ReservationsService {
    store: Arc<dyn Store>,
    policy: TransactionPolicy,
    clock: Arc<ReservationClock>,
}

impl ReservationsService {
    pub fn new(store: Arc<dyn Store>, policy: TransactionPolicy) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(ReservationClock::new()),
        }
    }

    /// Same engine with a caller-supplied deadline
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut service = self.clone();
        service.policy.timeout = timeout;
        service
    }

    pub fn policy(&self) -> &TransactionPolicy {
        &self.policy
    }

    /// Register a new patron; the email must not be taken
    pub async fn register_patron(&self, name: &str, email: &str) -> AppResult<Patron> {
        let input = NewPatron {
            name: name.to_string(),
            email: email.to_string(),
        };
        input.validate()?;

        let patron = self
            .run("register_patron", move |tx| {
                let input = input.clone();
                Box::pin(async move { register(tx, &input).await })
            })
            .await?;

        tracing::info!("Patron registered: id={} email={}", patron.id, patron.email);
        Ok(patron)
    }

    /// Add a title, or add copies to the existing `(title, author)` row
    pub async fn upsert_title(&self, title: &str, author: &str, copies: i64) -> AppResult<Title> {
        let input = NewTitle {
            title: title.to_string(),
            author: author.to_string(),
            copies,
        };
        input.validate()?;

        let row = self
            .run("upsert_title", move |tx| {
                let input = input.clone();
                Box::pin(async move { upsert(tx, &input).await })
            })
            .await?;

        tracing::info!(
            "Title upserted: id={} copies_available={}",
            row.id,
            row.copies_available
        );
        Ok(row)
    }

    /// Take one copy of a title for a patron
    pub async fn create_reservation(
        &self,
        email: &str,
        author: &str,
        title: &str,
    ) -> AppResult<Reservation> {
        let request = ReservationRequest::new(email, author, title);
        request.validate()?;

        let clock = self.clock.clone();
        let reservation = self
            .run("create_reservation", move |tx| {
                let request = request.clone();
                let clock = clock.clone();
                Box::pin(async move { reserve(tx, &clock, &request).await })
            })
            .await?;

        tracing::info!(
            "Reservation created: id={} patron={} title={}",
            reservation.id,
            reservation.patron_id,
            reservation.title_id
        );
        Ok(reservation)
    }

    /// Release the patron's oldest reservation of a title
    pub async fn cancel_oldest_reservation(
        &self,
        email: &str,
        author: &str,
        title: &str,
    ) -> AppResult<()> {
        let request = ReservationRequest::new(email, author, title);
        request.validate()?;

        let cancelled = self
            .run("cancel_oldest_reservation", move |tx| {
                let request = request.clone();
                Box::pin(async move { cancel_oldest(tx, &request).await })
            })
            .await?;

        tracing::info!(
            "Reservation cancelled: id={} patron={} title={}",
            cancelled.id,
            cancelled.patron_id,
            cancelled.title_id
        );
        Ok(())
    }

    /// Run `body` in a transaction under the retry policy and deadline.
    ///
    /// Hitting the deadline drops the in-flight transaction, which rolls it back.
    async fn run<T, F>(&self, operation: &'static str, body: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut dyn StoreTx) -> TxFuture<'t, T, TxError> + Send + Sync,
    {
        match tokio::time::timeout(self.policy.timeout, self.run_with_retries(operation, &body)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "{} exceeded its deadline of {:?}",
                    operation,
                    self.policy.timeout
                );
                Err(AppError::Internal("timeout".to_string()))
            }
        }
    }

    async fn run_with_retries<T, F>(&self, operation: &'static str, body: &F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut dyn StoreTx) -> TxFuture<'t, T, TxError> + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            match with_transaction(self.store.as_ref(), body).await {
                Ok(value) => return Ok(value),
                Err(TxError::Rejected(err)) => {
                    tracing::debug!("{} rejected: {}", operation, err);
                    return Err(err);
                }
                Err(TxError::Store(err)) if err.is_retryable() => {
                    if attempt >= self.policy.max_retries {
                        tracing::warn!(
                            "{} gave up after {} attempts: {}",
                            operation,
                            attempt + 1,
                            err
                        );
                        return Err(AppError::Internal("contention, retry later".to_string()));
                    }
                    attempt += 1;
                    tracing::warn!("{} conflicted, retry {}: {}", operation, attempt, err);
                    tokio::time::sleep(self.policy.retry_backoff * attempt).await;
                }
                Err(TxError::Store(err)) => return Err(err.into()),
            }
        }
    }
}

async fn register(tx: &mut dyn StoreTx, input: &NewPatron) -> Result<Patron, TxError> {
    match tx.insert_patron(&input.name, &input.email).await {
        Ok(patron) => Ok(patron),
        Err(StoreError::UniqueViolation(_)) => {
            Err(AppError::Conflict("email already registered".to_string()).into())
        }
        Err(err) => Err(err.into()),
    }
}

async fn upsert(tx: &mut dyn StoreTx, input: &NewTitle) -> Result<Title, TxError> {
    if let Some(existing) = tx.find_title(&input.title, &input.author).await? {
        return match tx.update_title_copies(existing.id, input.copies).await {
            Ok(row) => Ok(row),
            Err(StoreError::OutOfRange(_)) => {
                Err(AppError::InvalidArgument("copies out of range".to_string()).into())
            }
            Err(err) => Err(err.into()),
        };
    }

    match tx.insert_title(&input.title, &input.author, input.copies).await {
        Ok(row) => Ok(row),
        // A concurrent upsert inserted the same pair first; retrying will find it.
        Err(StoreError::UniqueViolation(msg)) => Err(StoreError::Conflict(msg).into()),
        Err(err) => Err(err.into()),
    }
}

/// Resolve patron and (locked) title for a request
async fn resolve(
    tx: &mut dyn StoreTx,
    request: &ReservationRequest,
) -> Result<(Patron, Title), TxError> {
    let patron = tx
        .find_patron_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("patron".to_string()))?;

    let title = tx
        .find_title(&request.title, &request.author)
        .await?
        .ok_or_else(|| AppError::NotFound("title".to_string()))?;

    Ok((patron, title))
}

async fn reserve(
    tx: &mut dyn StoreTx,
    clock: &ReservationClock,
    request: &ReservationRequest,
) -> Result<Reservation, TxError> {
    let (patron, title) = resolve(tx, request).await?;

    if title.copies_available <= 0 {
        return Err(AppError::Exhausted("no copies available".to_string()).into());
    }

    tx.update_title_copies(title.id, -1).await?;
    let reservation = tx
        .insert_reservation(patron.id, title.id, clock.now())
        .await?;
    Ok(reservation)
}

async fn cancel_oldest(
    tx: &mut dyn StoreTx,
    request: &ReservationRequest,
) -> Result<Reservation, TxError> {
    let (patron, title) = resolve(tx, request).await?;

    let reservation = tx
        .find_oldest_reservation(patron.id, title.id)
        .await?
        .ok_or_else(|| AppError::NotFound("reservation".to_string()))?;

    // Only a delete that removed the row may return the copy.
    match tx.delete_reservation(reservation.id).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(AppError::NotFound("reservation".to_string()).into());
        }
        Err(err) => return Err(err.into()),
    }

    tx.update_title_copies(title.id, 1).await?;
    Ok(reservation)
}
