//! # Startup schema orchestration
//!
//! Known migrations are compiled in as ordered up/down SQL pairs. On startup
//! the two `AUTO_*` flags select a [`MigrationPlan`], and the [`Migrator`]
//! walks it against the `migrations` ledger table:
//!
//! | auto_drop | auto_migrate | sequence                                  |
//! |-----------|--------------|-------------------------------------------|
//! | true      | true         | rollback all (reverse), apply all, seed   |
//! | true      | false        | rollback all (reverse)                    |
//! | false     | true         | apply all, seed                           |
//! | false     | false        | nothing                                   |
//!
//! Every step commits on its own. A failing step aborts the run; steps that
//! already committed stay committed.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::MigrationFlags;

pub mod seeder;
pub mod store;

use seeder::{SeedError, Seeder};
use store::MigrationStore;

/// One schema change and its inverse.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// Every migration this binary knows, oldest first.
pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "20240825005018_create_users_table",
    up: include_str!("../../migrations/20240825005018_create_users_table.up.sql"),
    down: include_str!("../../migrations/20240825005018_create_users_table.down.sql"),
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPlan {
    Skip,
    Drop,
    Migrate,
    Reset,
}

impl MigrationPlan {
    pub fn from_flags(flags: MigrationFlags) -> Self {
        match (flags.auto_drop, flags.auto_migrate) {
            (true, true) => MigrationPlan::Reset,
            (true, false) => MigrationPlan::Drop,
            (false, true) => MigrationPlan::Migrate,
            (false, false) => MigrationPlan::Skip,
        }
    }

    fn drops(self) -> bool {
        matches!(self, MigrationPlan::Drop | MigrationPlan::Reset)
    }

    fn migrates(self) -> bool {
        matches!(self, MigrationPlan::Migrate | MigrationPlan::Reset)
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration ledger unavailable: {0}")]
    Ledger(#[source] sqlx::Error),
    #[error("duplicate migration id in known set: {0}")]
    DuplicateId(&'static str),
    #[error("ledger contains unknown migration {0}")]
    UnknownMigration(String),
    #[error("migration {id} failed: {source}")]
    Apply {
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("rollback migration {id} failed: {source}")]
    Rollback {
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("seeder {name} failed: {source}")]
    Seed {
        name: &'static str,
        #[source]
        source: SeedError,
    },
}

/// What a run actually did, in execution order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub rolled_back: Vec<&'static str>,
    pub applied: Vec<&'static str>,
    pub seeded: usize,
}

pub struct Migrator<S> {
    store: S,
    migrations: &'static [Migration],
    seeders: Vec<Box<dyn Seeder>>,
}

impl<S: MigrationStore> Migrator<S> {
    pub fn new(store: S, migrations: &'static [Migration]) -> Self {
        Self {
            store,
            migrations,
            seeders: Vec::new(),
        }
    }

    pub fn with_seeder(mut self, seeder: impl Seeder + 'static) -> Self {
        self.seeders.push(Box::new(seeder));
        self
    }

    pub async fn run(&self, plan: MigrationPlan) -> Result<MigrationReport, MigrationError> {
        let mut report = MigrationReport::default();
        match plan {
            MigrationPlan::Skip => {
                info!("Skipping AutoMigrate and AutoDrop.");
                return Ok(report);
            }
            MigrationPlan::Reset => {
                info!("Running AutoDrop (Rollback all migrations) and AutoMigrate...")
            }
            MigrationPlan::Drop => info!("Running AutoDrop (Rollback all migrations)..."),
            MigrationPlan::Migrate => info!("Running AutoMigrate..."),
        }

        self.store.ensure_ledger().await.map_err(MigrationError::Ledger)?;
        self.validate().await?;

        if plan.drops() {
            report.rolled_back = self.rollback_all().await?;
        }
        if plan.migrates() {
            report.applied = self.migrate().await?;
            info!("Running Seeders...");
            report.seeded = self.seed().await?;
            info!("AutoMigrate and Seeders completed.");
        }
        Ok(report)
    }

    /// Ledger ids must all be known, and known ids must be unique.
    async fn validate(&self) -> Result<(), MigrationError> {
        let mut known = HashSet::with_capacity(self.migrations.len());
        for m in self.migrations {
            if !known.insert(m.id) {
                return Err(MigrationError::DuplicateId(m.id));
            }
        }
        let applied = self.store.applied().await.map_err(MigrationError::Ledger)?;
        if let Some(unknown) = applied.into_iter().find(|id| !known.contains(id.as_str())) {
            warn!(id = %unknown, "ledger has a migration this build does not know");
            return Err(MigrationError::UnknownMigration(unknown));
        }
        Ok(())
    }

    async fn applied_set(&self) -> Result<HashSet<String>, MigrationError> {
        Ok(self
            .store
            .applied()
            .await
            .map_err(MigrationError::Ledger)?
            .into_iter()
            .collect())
    }

    /// Applies pending migrations oldest first.
    pub async fn migrate(&self) -> Result<Vec<&'static str>, MigrationError> {
        let applied = self.applied_set().await?;
        let mut done = Vec::new();
        for m in self.migrations.iter().filter(|m| !applied.contains(m.id)) {
            info!(id = m.id, "applying migration");
            self.store
                .apply(m)
                .await
                .map_err(|source| MigrationError::Apply { id: m.id, source })?;
            done.push(m.id);
        }
        info!(count = done.len(), "database migration completed");
        Ok(done)
    }

    /// Reverts every known migration newest first, whether or not the ledger
    /// lists it. Down SQL must tolerate objects that are already gone.
    pub async fn rollback_all(&self) -> Result<Vec<&'static str>, MigrationError> {
        let mut done = Vec::new();
        for m in self.migrations.iter().rev() {
            info!(id = m.id, "rolling back migration");
            self.store
                .revert(m)
                .await
                .map_err(|source| MigrationError::Rollback { id: m.id, source })?;
            done.push(m.id);
        }
        info!(count = done.len(), "database tables dropped");
        Ok(done)
    }

    pub async fn seed(&self) -> Result<usize, MigrationError> {
        let mut total = 0;
        for s in &self.seeders {
            total += s.seed().await.map_err(|source| MigrationError::Seed {
                name: s.name(),
                source,
            })?;
        }
        info!(total, "Seed all success");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::auth::repo::memory::InMemoryUserRepository;
    use crate::migrations::seeder::{UserSeeder, SEED_USER_COUNT};

    const KNOWN: &[Migration] = &[
        Migration {
            id: "001_users",
            up: "CREATE TABLE users ()",
            down: "DROP TABLE users",
        },
        Migration {
            id: "002_profiles",
            up: "CREATE TABLE profiles ()",
            down: "DROP TABLE profiles",
        },
    ];

    /// Ledger plus a log of every call, with optional failure injection.
    #[derive(Default)]
    struct FakeStore {
        ledger: Mutex<Vec<String>>,
        log: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl FakeStore {
        fn with_ledger(ids: &[&str]) -> Self {
            Self {
                ledger: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            }
        }

        fn ledger(&self) -> Vec<String> {
            self.ledger.lock().unwrap().clone()
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MigrationStore for Arc<FakeStore> {
        async fn ensure_ledger(&self) -> Result<(), sqlx::Error> {
            self.log.lock().unwrap().push("ensure".into());
            Ok(())
        }

        async fn applied(&self) -> Result<Vec<String>, sqlx::Error> {
            Ok(self.ledger())
        }

        async fn apply(&self, m: &Migration) -> Result<(), sqlx::Error> {
            if self.fail_on == Some(m.id) {
                return Err(sqlx::Error::Protocol(format!("boom in {}", m.id)));
            }
            self.log.lock().unwrap().push(format!("up:{}", m.id));
            self.ledger.lock().unwrap().push(m.id.to_string());
            Ok(())
        }

        async fn revert(&self, m: &Migration) -> Result<(), sqlx::Error> {
            if self.fail_on == Some(m.id) {
                return Err(sqlx::Error::Protocol(format!("boom in {}", m.id)));
            }
            self.log.lock().unwrap().push(format!("down:{}", m.id));
            self.ledger.lock().unwrap().retain(|id| id != m.id);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingSeeder(Arc<AtomicUsize>);

    #[async_trait]
    impl Seeder for CountingSeeder {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn seed(&self) -> Result<usize, SeedError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }
    }

    fn migrator(store: &Arc<FakeStore>, seeder: &CountingSeeder) -> Migrator<Arc<FakeStore>> {
        Migrator::new(store.clone(), KNOWN).with_seeder(seeder.clone())
    }

    fn flags(auto_drop: bool, auto_migrate: bool) -> MigrationFlags {
        MigrationFlags {
            auto_migrate,
            auto_drop,
        }
    }

    #[test]
    fn plan_table() {
        assert_eq!(MigrationPlan::from_flags(flags(true, true)), MigrationPlan::Reset);
        assert_eq!(MigrationPlan::from_flags(flags(true, false)), MigrationPlan::Drop);
        assert_eq!(MigrationPlan::from_flags(flags(false, true)), MigrationPlan::Migrate);
        assert_eq!(MigrationPlan::from_flags(flags(false, false)), MigrationPlan::Skip);
    }

    #[test]
    fn known_migrations_embed_sql() {
        assert!(!MIGRATIONS.is_empty());
        for m in MIGRATIONS {
            assert!(m.id.len() <= 255);
            assert!(m.up.contains("CREATE TABLE"));
            assert!(m.down.contains("DROP TABLE"));
        }
    }

    #[tokio::test]
    async fn reset_on_empty_database() {
        let store = Arc::new(FakeStore::default());
        let seeder = CountingSeeder::default();
        let report = migrator(&store, &seeder).run(MigrationPlan::Reset).await.unwrap();

        assert_eq!(report.rolled_back, vec!["002_profiles", "001_users"]);
        assert_eq!(report.applied, vec!["001_users", "002_profiles"]);
        assert_eq!(report.seeded, 3);
        assert_eq!(store.ledger(), vec!["001_users", "002_profiles"]);
        assert_eq!(seeder.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_reverts_in_reverse_then_applies_forward() {
        let store = Arc::new(FakeStore::with_ledger(&["001_users", "002_profiles"]));
        let seeder = CountingSeeder::default();
        migrator(&store, &seeder).run(MigrationPlan::Reset).await.unwrap();

        assert_eq!(
            store.log(),
            vec![
                "ensure",
                "down:002_profiles",
                "down:001_users",
                "up:001_users",
                "up:002_profiles"
            ]
        );
        assert_eq!(store.ledger(), vec!["001_users", "002_profiles"]);
    }

    #[tokio::test]
    async fn drop_only_does_not_migrate_or_seed() {
        let store = Arc::new(FakeStore::with_ledger(&["001_users", "002_profiles"]));
        let seeder = CountingSeeder::default();
        let report = migrator(&store, &seeder).run(MigrationPlan::Drop).await.unwrap();

        assert_eq!(report.rolled_back, vec!["002_profiles", "001_users"]);
        assert!(report.applied.is_empty());
        assert!(store.ledger().is_empty());
        assert_eq!(seeder.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn drop_reverts_known_migrations_missing_from_ledger() {
        let store = Arc::new(FakeStore::default());
        let seeder = CountingSeeder::default();
        let report = migrator(&store, &seeder).run(MigrationPlan::Drop).await.unwrap();

        assert_eq!(report.rolled_back, vec!["002_profiles", "001_users"]);
        assert_eq!(
            store.log(),
            vec!["ensure", "down:002_profiles", "down:001_users"]
        );
        assert!(store.ledger().is_empty());
    }

    #[tokio::test]
    async fn migrate_applies_only_pending() {
        let store = Arc::new(FakeStore::with_ledger(&["001_users"]));
        let seeder = CountingSeeder::default();
        let report = migrator(&store, &seeder).run(MigrationPlan::Migrate).await.unwrap();

        assert_eq!(report.applied, vec!["002_profiles"]);
        assert_eq!(store.log(), vec!["ensure", "up:002_profiles"]);
        assert_eq!(seeder.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skip_touches_nothing() {
        let store = Arc::new(FakeStore::with_ledger(&["something_unknown"]));
        let seeder = CountingSeeder::default();
        let report = migrator(&store, &seeder).run(MigrationPlan::Skip).await.unwrap();

        assert_eq!(report, MigrationReport::default());
        assert!(store.log().is_empty());
        assert_eq!(seeder.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_ledger_entry_fails_before_any_step() {
        let store = Arc::new(FakeStore::with_ledger(&["001_users", "999_mystery"]));
        let seeder = CountingSeeder::default();
        let err = migrator(&store, &seeder).run(MigrationPlan::Reset).await.unwrap_err();

        assert!(matches!(err, MigrationError::UnknownMigration(ref id) if id == "999_mystery"));
        assert_eq!(store.log(), vec!["ensure"]);
        assert_eq!(store.ledger(), vec!["001_users", "999_mystery"]);
    }

    #[tokio::test]
    async fn duplicate_known_ids_are_rejected() {
        const DUPES: &[Migration] = &[
            Migration {
                id: "001_users",
                up: "",
                down: "",
            },
            Migration {
                id: "001_users",
                up: "",
                down: "",
            },
        ];
        let store = Arc::new(FakeStore::default());
        let err = Migrator::new(store.clone(), DUPES)
            .run(MigrationPlan::Migrate)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateId("001_users")));
    }

    #[tokio::test]
    async fn failure_aborts_and_keeps_committed_steps() {
        let store = Arc::new(FakeStore {
            fail_on: Some("002_profiles"),
            ..Default::default()
        });
        let seeder = CountingSeeder::default();
        let err = migrator(&store, &seeder).run(MigrationPlan::Migrate).await.unwrap_err();

        assert!(matches!(err, MigrationError::Apply { id: "002_profiles", .. }));
        assert_eq!(store.ledger(), vec!["001_users"]);
        assert_eq!(seeder.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rollback_failure_is_reported() {
        let store = Arc::new(FakeStore {
            ledger: Mutex::new(vec!["001_users".into(), "002_profiles".into()]),
            fail_on: Some("001_users"),
            ..Default::default()
        });
        let seeder = CountingSeeder::default();
        let err = migrator(&store, &seeder).run(MigrationPlan::Reset).await.unwrap_err();

        assert!(matches!(err, MigrationError::Rollback { id: "001_users", .. }));
        assert_eq!(store.ledger(), vec!["001_users"]);
    }

    #[tokio::test]
    async fn reset_with_user_seeder_seeds_users() {
        let store = Arc::new(FakeStore::default());
        let users = Arc::new(InMemoryUserRepository::default());
        let report = Migrator::new(store.clone(), MIGRATIONS)
            .with_seeder(UserSeeder::new(users.clone()))
            .run(MigrationPlan::Reset)
            .await
            .unwrap();

        let ids: Vec<&str> = MIGRATIONS.iter().map(|m| m.id).collect();
        assert_eq!(report.applied, ids);
        assert_eq!(store.ledger(), ids);
        assert_eq!(report.seeded, SEED_USER_COUNT);
        assert_eq!(users.len(), SEED_USER_COUNT);
    }
}
