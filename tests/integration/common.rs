//! Shared fixtures

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use library_reservations::{
    models::{Patron, Reservation, Title},
    repository::{MemoryStore, Store, StoreError, StoreResult, StoreTx},
    services::{ReservationsService, TransactionPolicy},
};

pub fn policy() -> TransactionPolicy {
    TransactionPolicy {
        max_retries: 3,
        retry_backoff: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
    }
}

pub fn engine() -> (ReservationsService, MemoryStore) {
    let store = MemoryStore::new();
    let engine = ReservationsService::new(Arc::new(store.clone()), policy());
    (engine, store)
}

/// Number of active reservations per title id
pub async fn reserved_count(store: &dyn Store, title_id: i64) -> i64 {
    store
        .list_reservations()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.title_id == title_id)
        .count() as i64
}

/// Memory store with injected faults
#[derive(Clone)]
pub struct FaultyStore {
    inner: MemoryStore,
    failures: Arc<AtomicU32>,
    lose_deletes: bool,
    pub commit_attempts: Arc<AtomicU32>,
}

impl FaultyStore {
    /// Commits fail with a serialization conflict until `failures` of them
    /// have been rejected
    pub fn conflicting(inner: MemoryStore, failures: u32) -> Self {
        Self {
            inner,
            failures: Arc::new(AtomicU32::new(failures)),
            lose_deletes: false,
            commit_attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Every reservation delete affects zero rows, as if another
    /// transaction removed the row first
    pub fn losing_deletes(inner: MemoryStore) -> Self {
        Self {
            lose_deletes: true,
            ..Self::conflicting(inner, 0)
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        Ok(Box::new(FaultyTx {
            inner: self.inner.begin().await?,
            failures: self.failures.clone(),
            lose_deletes: self.lose_deletes,
            commit_attempts: self.commit_attempts.clone(),
        }))
    }

    async fn list_titles(&self) -> StoreResult<Vec<Title>> {
        self.inner.list_titles().await
    }

    async fn list_patrons(&self) -> StoreResult<Vec<Patron>> {
        self.inner.list_patrons().await
    }

    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>> {
        self.inner.list_reservations().await
    }

    async fn patron_reservations(&self, email: &str) -> StoreResult<Option<Vec<Reservation>>> {
        self.inner.patron_reservations(email).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

struct FaultyTx {
    inner: Box<dyn StoreTx>,
    failures: Arc<AtomicU32>,
    lose_deletes: bool,
    commit_attempts: Arc<AtomicU32>,
}

#[async_trait]
impl StoreTx for FaultyTx {
    async fn find_patron_by_email(&mut self, email: &str) -> StoreResult<Option<Patron>> {
        self.inner.find_patron_by_email(email).await
    }

    async fn insert_patron(&mut self, name: &str, email: &str) -> StoreResult<Patron> {
        self.inner.insert_patron(name, email).await
    }

    async fn find_title(&mut self, title: &str, author: &str) -> StoreResult<Option<Title>> {
        self.inner.find_title(title, author).await
    }

    async fn insert_title(&mut self, title: &str, author: &str, copies: i64) -> StoreResult<Title> {
        self.inner.insert_title(title, author, copies).await
    }

    async fn update_title_copies(&mut self, id: i64, delta: i64) -> StoreResult<Title> {
        self.inner.update_title_copies(id, delta).await
    }

    async fn insert_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Reservation> {
        self.inner
            .insert_reservation(patron_id, title_id, created_at)
            .await
    }

    async fn find_oldest_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
    ) -> StoreResult<Option<Reservation>> {
        self.inner.find_oldest_reservation(patron_id, title_id).await
    }

    async fn delete_reservation(&mut self, id: i64) -> StoreResult<()> {
        if self.lose_deletes {
            return Err(StoreError::NotFound(format!("reservation {}", id)));
        }
        self.inner.delete_reservation(id).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.commit_attempts.fetch_add(1, Ordering::SeqCst);

        let rejected = this
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(StoreError::Conflict(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }

        this.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await
    }
}
