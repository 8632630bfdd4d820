use std::str::FromStr as _;

use anyhow::{Context as _, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

/// The main database connection pool.
pub type Db = SqlitePool;

/// Embedded schema migrations, applied on startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Open (and create, if missing) the application database and apply any
/// pending migrations.
pub async fn establish_pool(url: &str) -> Result<Db> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("failed to parse database url {url:?}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .connect_with(opts)
        .await
        .context("failed to open database")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("failed to apply migrations")?;

    Ok(pool)
}
