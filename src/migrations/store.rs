use async_trait::async_trait;
use sqlx::{Executor, PgPool};
use tracing::debug;

use super::Migration;

/// Ledger-backed schema store. Each `apply`/`revert` is one transaction that
/// covers both the schema change and its ledger row.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    async fn ensure_ledger(&self) -> Result<(), sqlx::Error>;
    /// Ledger ids in the order they were applied.
    async fn applied(&self) -> Result<Vec<String>, sqlx::Error>;
    async fn apply(&self, migration: &Migration) -> Result<(), sqlx::Error>;
    async fn revert(&self, migration: &Migration) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgMigrationStore {
    db: PgPool,
}

impl PgMigrationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
        self.db
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS migrations (
                    id          VARCHAR(255) PRIMARY KEY,
                    applied_at  TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#,
            )
            .await?;
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT id FROM migrations ORDER BY applied_at, id")
            .fetch_all(&self.db)
            .await
    }

    async fn apply(&self, migration: &Migration) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        // Plain &str goes over the simple query protocol, so multi-statement SQL is fine.
        (&mut *tx).execute(migration.up).await?;
        sqlx::query("INSERT INTO migrations (id, applied_at) VALUES ($1, now())")
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(id = migration.id, "migration applied");
        Ok(())
    }

    async fn revert(&self, migration: &Migration) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        (&mut *tx).execute(migration.down).await?;
        sqlx::query("DELETE FROM migrations WHERE id = $1")
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(id = migration.id, "migration rolled back");
        Ok(())
    }
}
