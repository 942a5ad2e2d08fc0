//! In-process store
//!
//! All tables live behind one async mutex. A transaction owns the lock for
//! its whole lifetime and works on a private copy of the tables, so
//! transactions are fully serialized and an abandoned one publishes nothing.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreError, StoreResult, StoreTx};
use crate::models::{Patron, Reservation, Title};

#[derive(Debug, Clone, Default)]
struct Tables {
    patrons: BTreeMap<i64, Patron>,
    titles: BTreeMap<i64, Title>,
    reservations: BTreeMap<i64, Reservation>,
    last_patron_id: i64,
    last_title_id: i64,
    last_reservation_id: i64,
}

impl Tables {
    fn sorted_reservations(&self) -> Vec<Reservation> {
        let mut reservations: Vec<Reservation> = self.reservations.values().cloned().collect();
        reservations.sort_by_key(|r| (r.created_at, r.id));
        reservations
    }
}

/// Store kept entirely in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = Tables::clone(&guard);
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn list_titles(&self) -> StoreResult<Vec<Title>> {
        Ok(self.tables.lock().await.titles.values().cloned().collect())
    }

    async fn list_patrons(&self) -> StoreResult<Vec<Patron>> {
        Ok(self.tables.lock().await.patrons.values().cloned().collect())
    }

    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>> {
        Ok(self.tables.lock().await.sorted_reservations())
    }

    async fn patron_reservations(&self, email: &str) -> StoreResult<Option<Vec<Reservation>>> {
        let tables = self.tables.lock().await;
        let Some(patron) = tables.patrons.values().find(|p| p.email == email) else {
            return Ok(None);
        };
        let patron_id = patron.id;

        Ok(Some(
            tables
                .sorted_reservations()
                .into_iter()
                .filter(|r| r.patron_id == patron_id)
                .collect(),
        ))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_patron_by_email(&mut self, email: &str) -> StoreResult<Option<Patron>> {
        Ok(self
            .working
            .patrons
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn insert_patron(&mut self, name: &str, email: &str) -> StoreResult<Patron> {
        if self.working.patrons.values().any(|p| p.email == email) {
            return Err(StoreError::UniqueViolation(format!("patrons.email = {}", email)));
        }

        self.working.last_patron_id += 1;
        let patron = Patron {
            id: self.working.last_patron_id,
            name: name.to_string(),
            email: email.to_string(),
        };
        self.working.patrons.insert(patron.id, patron.clone());
        Ok(patron)
    }

    async fn find_title(&mut self, title: &str, author: &str) -> StoreResult<Option<Title>> {
        Ok(self
            .working
            .titles
            .values()
            .find(|t| t.title == title && t.author == author)
            .cloned())
    }

    async fn insert_title(&mut self, title: &str, author: &str, copies: i64) -> StoreResult<Title> {
        if copies < 0 {
            return Err(StoreError::CheckViolation("titles.copies_available >= 0".to_string()));
        }
        if self
            .working
            .titles
            .values()
            .any(|t| t.title == title && t.author == author)
        {
            return Err(StoreError::UniqueViolation(format!(
                "titles (title, author) = ({}, {})",
                title, author
            )));
        }

        self.working.last_title_id += 1;
        let row = Title {
            id: self.working.last_title_id,
            title: title.to_string(),
            author: author.to_string(),
            copies_available: copies,
        };
        self.working.titles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_title_copies(&mut self, id: i64, delta: i64) -> StoreResult<Title> {
        let row = self
            .working
            .titles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("title {}", id)))?;

        let copies = row
            .copies_available
            .checked_add(delta)
            .ok_or_else(|| StoreError::OutOfRange(format!("title {} copies_available", id)))?;
        if copies < 0 {
            return Err(StoreError::CheckViolation("titles.copies_available >= 0".to_string()));
        }

        row.copies_available = copies;
        Ok(row.clone())
    }

    async fn insert_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Reservation> {
        if !self.working.patrons.contains_key(&patron_id) {
            return Err(StoreError::ForeignKeyViolation(format!("patron {}", patron_id)));
        }
        if !self.working.titles.contains_key(&title_id) {
            return Err(StoreError::ForeignKeyViolation(format!("title {}", title_id)));
        }

        self.working.last_reservation_id += 1;
        let reservation = Reservation {
            id: self.working.last_reservation_id,
            patron_id,
            title_id,
            created_at,
        };
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_oldest_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
    ) -> StoreResult<Option<Reservation>> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| r.patron_id == patron_id && r.title_id == title_id)
            .min_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn delete_reservation(&mut self, id: i64) -> StoreResult<()> {
        self.working
            .reservations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("reservation {}", id)))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
