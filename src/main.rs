use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing::{error, info};

mod app;
mod auth;
mod config;
mod db;
mod error;
mod logging;
mod migrations;
mod response;
mod state;
mod validation;

use crate::{
    auth::repo::{PgUserRepository, UserRepository},
    config::AppConfig,
    migrations::{
        seeder::UserSeeder, store::PgMigrationStore, MigrationPlan, Migrator, MIGRATIONS,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let _log_guard = logging::init(&config.log)?;

    let pool = db::connect(&config.database).await?;

    let plan = MigrationPlan::from_flags(config.migrations);
    let users = Arc::new(PgUserRepository::new(pool.clone())) as Arc<dyn UserRepository>;
    let migrator = Migrator::new(PgMigrationStore::new(pool.clone()), MIGRATIONS)
        .with_seeder(UserSeeder::new(users));
    let report = migrator.run(plan).await.map_err(|e| {
        error!(error = %e, ?plan, "startup schema step failed");
        e
    })?;
    info!(?plan, ?report, "startup schema step finished");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let app = app::build_app(AppState::new(pool.clone(), &config.jwt));
    app::serve(app, addr).await?;

    // Abandoned handlers may still hold connections after a forced shutdown.
    db::close(&pool, app::SHUTDOWN_GRACE).await;
    Ok(())
}
