//! Global database pool and schema creation.

use crate::orm::{
    courses, note_actions, note_comments, note_likes, note_ratings, note_saves, notes, profiles,
    subjects, users,
};
use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Connects with the given options.
pub async fn connect(url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);
    Database::connect(opt).await
}

/// Opens the global pool. Later calls keep the first pool.
pub async fn init_db(url: &str, max_connections: u32) -> Result<(), DbErr> {
    let pool = connect(url, max_connections).await?;
    if DB_POOL.set(pool).is_err() {
        log::warn!("Database pool already initialized");
    }
    Ok(())
}

/// # Panics
/// If `init_db` has not completed.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL
        .get()
        .expect("database pool used before init_db was called")
}

/// Creates every table that does not exist yet, parents before children.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = [
        schema.create_table_from_entity(courses::Entity),
        schema.create_table_from_entity(subjects::Entity),
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(profiles::Entity),
        schema.create_table_from_entity(notes::Entity),
        schema.create_table_from_entity(note_actions::Entity),
        schema.create_table_from_entity(note_likes::Entity),
        schema.create_table_from_entity(note_saves::Entity),
        schema.create_table_from_entity(note_ratings::Entity),
        schema.create_table_from_entity(note_comments::Entity),
    ];

    for mut stmt in statements {
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    log::info!("Database schema ready");
    Ok(())
}
