//! PostgreSQL store tests
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use library_reservations::{
    repository::{PgStore, Store},
    services::ReservationsService,
    AppError,
};

use crate::common::{policy, reserved_count};

async fn pg_store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to run migrations");
    store
}

/// Names unique to one test run, so tests can share a database
fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_last_copy_race() {
    let store = pg_store().await;
    let engine = ReservationsService::new(Arc::new(store.clone()), policy());
    let title = unique("race");

    let row = engine.upsert_title(&title, "Herbert", 1).await.unwrap();
    let mut emails = Vec::new();
    for i in 0..12 {
        let email = unique(&format!("p{}", i));
        engine.register_patron("racer", &email).await.unwrap();
        emails.push(email);
    }

    let handles: Vec<_> = emails
        .into_iter()
        .map(|email| {
            let engine = engine.clone();
            let title = title.clone();
            tokio::spawn(async move { engine.create_reservation(&email, "Herbert", &title).await })
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(AppError::Exhausted(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(reserved_count(&store, row.id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_upserts_of_new_pair() {
    let store = pg_store().await;
    let engine = ReservationsService::new(Arc::new(store.clone()), policy());
    let title = unique("upsert");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let title = title.clone();
            tokio::spawn(async move { engine.upsert_title(&title, "Herbert", 2).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let rows: Vec<_> = store
        .list_titles()
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.title == title)
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].copies_available, 16);
}

#[tokio::test]
#[ignore]
async fn test_pg_duplicate_email_and_fifo_cancel() {
    let store = pg_store().await;
    let engine = ReservationsService::new(Arc::new(store.clone()), policy());
    let email = unique("fifo");
    let title = unique("fifo-title");

    engine.register_patron("fifo", &email).await.unwrap();
    let err = engine.register_patron("again", &email).await.unwrap_err();
    assert_eq!(err, AppError::Conflict("email already registered".to_string()));

    let row = engine.upsert_title(&title, "Herbert", 2).await.unwrap();
    let first = engine.create_reservation(&email, "Herbert", &title).await.unwrap();
    let second = engine.create_reservation(&email, "Herbert", &title).await.unwrap();

    engine
        .cancel_oldest_reservation(&email, "Herbert", &title)
        .await
        .unwrap();
    let remaining: Vec<_> = store
        .list_reservations()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.title_id == row.id)
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![second.id]);
    assert_ne!(first.id, second.id);

    let held = store.patron_reservations(&email).await.unwrap();
    assert_eq!(held, Some(vec![second]));
    assert_eq!(store.patron_reservations(&unique("nobody")).await.unwrap(), None);
}
