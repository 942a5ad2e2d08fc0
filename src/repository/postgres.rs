//! PostgreSQL store
//!
//! Read-modify-write on `titles.copies_available` is protected by row locks:
//! every title lookup inside a transaction is `SELECT ... FOR UPDATE`, held
//! until commit or rollback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{Store, StoreError, StoreResult, StoreTx};
use crate::models::{Patron, Reservation, Title};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation(message),
                Some("23503") => return StoreError::ForeignKeyViolation(message),
                Some("23514") => return StoreError::CheckViolation(message),
                // numeric_value_out_of_range
                Some("22003") => return StoreError::OutOfRange(message),
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => return StoreError::Conflict(message),
                _ => {}
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pub pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn list_titles(&self) -> StoreResult<Vec<Title>> {
        let titles = sqlx::query_as::<_, Title>(
            "SELECT id, title, author, copies_available FROM titles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }

    async fn list_patrons(&self) -> StoreResult<Vec<Patron>> {
        let patrons = sqlx::query_as::<_, Patron>("SELECT id, name, email FROM patrons ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(patrons)
    }

    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, patron_id, title_id, created_at
            FROM reservations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn patron_reservations(&self, email: &str) -> StoreResult<Option<Vec<Reservation>>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let patron_id = sqlx::query_scalar::<_, i64>("SELECT id FROM patrons WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(patron_id) = patron_id else {
            tx.commit().await?;
            return Ok(None);
        };

        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, patron_id, title_id, created_at
            FROM reservations
            WHERE patron_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(patron_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(reservations))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn find_patron_by_email(&mut self, email: &str) -> StoreResult<Option<Patron>> {
        let patron = sqlx::query_as::<_, Patron>(
            "SELECT id, name, email FROM patrons WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(patron)
    }

    async fn insert_patron(&mut self, name: &str, email: &str) -> StoreResult<Patron> {
        let patron = sqlx::query_as::<_, Patron>(
            r#"
            INSERT INTO patrons (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(patron)
    }

    async fn find_title(&mut self, title: &str, author: &str) -> StoreResult<Option<Title>> {
        let row = sqlx::query_as::<_, Title>(
            r#"
            SELECT id, title, author, copies_available
            FROM titles
            WHERE title = $1 AND author = $2
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(title)
        .bind(author)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_title(&mut self, title: &str, author: &str, copies: i64) -> StoreResult<Title> {
        let row = sqlx::query_as::<_, Title>(
            r#"
            INSERT INTO titles (title, author, copies_available)
            VALUES ($1, $2, $3)
            RETURNING id, title, author, copies_available
            "#,
        )
        .bind(title)
        .bind(author)
        .bind(copies)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn update_title_copies(&mut self, id: i64, delta: i64) -> StoreResult<Title> {
        sqlx::query_as::<_, Title>(
            r#"
            UPDATE titles
            SET copies_available = copies_available + $2
            WHERE id = $1
            RETURNING id, title, author, copies_available
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("title {}", id)))
    }

    async fn insert_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (patron_id, title_id, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, patron_id, title_id, created_at
            "#,
        )
        .bind(patron_id)
        .bind(title_id)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn find_oldest_reservation(
        &mut self,
        patron_id: i64,
        title_id: i64,
    ) -> StoreResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, patron_id, title_id, created_at
            FROM reservations
            WHERE patron_id = $1 AND title_id = $2
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(patron_id)
        .bind(title_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn delete_reservation(&mut self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("reservation {}", id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
