pub mod stops;

pub use stops::*;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Error};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

/// Opens the stop database, creating the file when missing, and brings the
/// schema up to date.
#[tracing::instrument(err)]
pub async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url {database_url}"))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    // Every connection to an in-memory database sees its own empty database
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Error running migrations")?;

    info!("connected to {database_url}");

    Ok(pool)
}
