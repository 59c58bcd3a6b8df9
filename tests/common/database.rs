//! Test database setup
#![allow(dead_code)]

use pamana::store::{DbStore, MemoryStore, NoteStore};
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;

/// A fresh in-memory SQLite database with every table created.
///
/// The pool holds exactly one connection: each SQLite memory connection is
/// its own database.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let db = pamana::db::connect("sqlite::memory:", 1).await?;
    pamana::db::create_schema(&db).await?;
    Ok(db)
}

pub async fn db_store() -> Arc<DbStore> {
    let db = setup_test_database()
        .await
        .expect("Failed to set up test database");
    Arc::new(DbStore::new(db))
}

/// Both backends, for tests that must hold for either.
pub async fn all_stores() -> Vec<(&'static str, Arc<dyn NoteStore>)> {
    vec![
        ("db", db_store().await as Arc<dyn NoteStore>),
        ("memory", Arc::new(MemoryStore::new()) as Arc<dyn NoteStore>),
    ]
}
