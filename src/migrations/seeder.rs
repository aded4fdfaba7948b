use std::sync::Arc;

use async_trait::async_trait;
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::{
    password::{hash_password, PasswordError},
    repo::UserRepository,
    repo_types::{NewUser, StoreError},
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Hashing(#[from] PasswordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Populates freshly migrated tables with sample data.
#[async_trait]
pub trait Seeder: Send + Sync {
    fn name(&self) -> &'static str;
    /// Returns how many rows were inserted.
    async fn seed(&self) -> Result<usize, SeedError>;
}

pub const SEED_USER_COUNT: usize = 15;
pub const SEED_USER_PASSWORD: &str = "test12345";

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Dennis", "Donald", "Edsger", "Frances", "Grace", "John",
    "Ken", "Leslie", "Margaret", "Niklaus", "Radia", "Tony",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Dijkstra", "Hamilton", "Hoare", "Hopper", "Knuth", "Lamport", "Liskov", "Lovelace",
    "McCarthy", "Perlman", "Ritchie", "Shannon", "Thompson", "Turing", "Wirth",
];

pub struct UserSeeder {
    users: Arc<dyn UserRepository>,
    count: usize,
}

impl UserSeeder {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self {
            users,
            count: SEED_USER_COUNT,
        }
    }

    fn random_user<R: Rng>(rng: &mut R) -> (String, String, String) {
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Sample");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("User");
        let tag: u32 = rng.gen();
        let email = format!(
            "{}.{}.{:08x}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            tag
        );
        (first.to_string(), last.to_string(), email)
    }
}

#[async_trait]
impl Seeder for UserSeeder {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn seed(&self) -> Result<usize, SeedError> {
        let mut inserted = 0;
        for _ in 0..self.count {
            // ThreadRng is !Send; keep it out of scope across the await below.
            let (first, last, email) = Self::random_user(&mut rand::thread_rng());
            let hash = hash_password(SEED_USER_PASSWORD)?;
            match self.users.create(NewUser::new(first, last, email, hash)).await {
                Ok(_) => inserted += 1,
                Err(StoreError::DuplicateEmail) => debug!("seed email collided; skipping"),
                Err(e) => return Err(e.into()),
            }
        }
        info!(inserted, "seed users success");
        Ok(inserted)
    }
}
