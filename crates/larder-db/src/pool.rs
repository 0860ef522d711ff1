//! Pool construction, embedded migrations and database bootstrap.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/larder-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by larder, in foreign-key order.
pub const TABLES: &[&str] = &[
    "products",
    "lots",
    "recipes",
    "recipe_ingredients",
    "meal_plans",
    "meal_plan_items",
    "reservations",
    "stock_movements",
];

/// Name reported to the server, visible in `pg_stat_activity`.
const APPLICATION_NAME: &str = "larder";

/// Create a connection pool for the configured database.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid database URL {}", config.database_url))?
        .application_name(APPLICATION_NAME);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))?;

    debug!(max_connections = config.max_connections, "database pool ready");
    Ok(pool)
}

/// Apply every pending embedded migration.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!(known = MIGRATOR.iter().count(), "schema up to date");
    Ok(())
}

/// `CREATE DATABASE` for `name`, which must be a plain identifier since the
/// statement cannot take a bind parameter.
fn create_database_sql(name: &str) -> Result<String> {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !plain {
        anyhow::bail!("database name {name:?} contains invalid characters");
    }
    Ok(format!("CREATE DATABASE \"{name}\""))
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists. Returns whether it was created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    let create = create_database_sql(db_name)?;

    let maintenance_url = config.maintenance_url();
    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if !exists {
        maint_pool
            .execute(create.as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(!exists)
}

fn table_counts_sql() -> String {
    TABLES
        .iter()
        .map(|t| format!("SELECT '{t}'::text, COUNT(*) FROM {t}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

/// Row count of every larder table, in [`TABLES`] order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(&table_counts_sql())
        .fetch_all(pool)
        .await
        .context("failed to count table rows")?;

    // UNION ALL does not promise order.
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let count = rows
            .iter()
            .find(|(name, _)| name.as_str() == *table)
            .map(|(_, c)| *c)
            .with_context(|| format!("no row count for table {table}"))?;
        counts.push(((*table).to_owned(), count));
    }
    Ok(counts)
}
