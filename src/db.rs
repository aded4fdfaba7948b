use std::time::Duration;

use anyhow::Context;
use log::LevelFilter;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, PgPool,
};

use crate::config::DatabaseConfig;

const SLOW_STATEMENT: Duration = Duration::from_millis(200);

pub fn connect_options(cfg: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, SLOW_STATEMENT)
}

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(connect_options(cfg))
        .await
        .with_context(|| format!("connect to database {}@{}:{}", cfg.name, cfg.host, cfg.port))?;
    tracing::info!(host = %cfg.host, port = cfg.port, database = %cfg.name, "database connected");
    Ok(pool)
}

/// Closes the pool, giving up after `limit` while connections are still
/// checked out. Returns whether the close completed.
pub async fn close(pool: &PgPool, limit: Duration) -> bool {
    match tokio::time::timeout(limit, pool.close()).await {
        Ok(()) => {
            tracing::info!("database pool closed");
            true
        }
        Err(_) => {
            tracing::warn!(?limit, size = pool.size(), "database pool did not close in time");
            false
        }
    }
}

/// Pool for tests that need a real server; `None` unless `DATABASE_URL` is set.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(PgPool::connect(&url).await.expect("connect to DATABASE_URL"))
}
