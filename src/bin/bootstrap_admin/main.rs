use anyhow::{bail, Context};
use env_logger::Env;
use pamana::db::{create_schema, get_db_pool, init_db};
use pamana::store::DbStore;
use pamana::NoteService;
use std::sync::Arc;

/// Creates the first admin from ADMIN_BOOTSTRAP_* variables and the schema
/// if it is missing. Does nothing when an admin already exists.
#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    pamana::app_config::init();

    let database = pamana::app_config::database();
    let database_url = std::env::var("DATABASE_URL").unwrap_or(database.url);

    let school_id = std::env::var("ADMIN_BOOTSTRAP_SCHOOL_ID").ok().filter(|v| !v.is_empty());
    let email = std::env::var("ADMIN_BOOTSTRAP_EMAIL").ok().filter(|v| !v.is_empty());
    let password = std::env::var("ADMIN_BOOTSTRAP_PASSWORD").ok().filter(|v| !v.is_empty());
    let (Some(school_id), Some(email), Some(password)) = (school_id, email, password) else {
        bail!(
            "Set ADMIN_BOOTSTRAP_SCHOOL_ID, ADMIN_BOOTSTRAP_EMAIL, and ADMIN_BOOTSTRAP_PASSWORD to create the admin."
        );
    };

    init_db(&database_url, database.max_connections)
        .await
        .context("Failed to connect to the database")?;
    create_schema(get_db_pool())
        .await
        .context("Failed to create the database schema")?;

    let service = NoteService::from_config(
        Arc::new(DbStore::from_pool()),
        &pamana::app_config::get_config(),
    );
    match service
        .bootstrap_admin(&school_id, &email, &password)
        .await
        .context("Failed to create the admin")?
    {
        Some(admin) => log::info!("Superuser created: {}", admin.school_id),
        None => log::warn!("Superuser already exists."),
    }

    Ok(())
}
