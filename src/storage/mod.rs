/// Persistence boundary
///
/// The engine reads user records and score configs and upserts scoring
/// output. Real persistence lives with the surrounding application;
/// `MemoryStore` backs the binary and the tests.
use crate::config::StoredScoreConfig;
use crate::core::{DeveloperWorth, ScoreResult, StorageError, UserData, UserRecord};
use async_trait::async_trait;
use dashmap::DashMap;

/// Store interface the engine depends on. Score and worth writes are
/// full overwrites keyed by user id.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load_user(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError>;

    async fn save_user(&self, record: UserRecord) -> Result<(), StorageError>;

    /// Attach a fresh analysis bundle to an existing user
    async fn attach_analysis(&self, user_id: &str, data: UserData) -> Result<(), StorageError>;

    /// Read a named score configuration; the engine never writes these
    async fn load_score_config(
        &self,
        name: &str,
    ) -> Result<Option<StoredScoreConfig>, StorageError>;

    async fn upsert_score(&self, score: &ScoreResult) -> Result<(), StorageError>;

    async fn upsert_worth(&self, worth: &DeveloperWorth) -> Result<(), StorageError>;

    async fn load_score(&self, user_id: &str) -> Result<Option<ScoreResult>, StorageError>;

    async fn load_worth(&self, user_id: &str) -> Result<Option<DeveloperWorth>, StorageError>;
}

/// In-memory store over concurrent maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserRecord>,
    configs: DashMap<String, StoredScoreConfig>,
    scores: DashMap<String, ScoreResult>,
    worths: DashMap<String, DeveloperWorth>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a named configuration; the platform owns config writes
    pub fn put_config(&self, name: &str, config: StoredScoreConfig) {
        self.configs.insert(name.to_string(), config);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn load_user(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.get(user_id).map(|r| r.clone()))
    }

    async fn save_user(&self, record: UserRecord) -> Result<(), StorageError> {
        self.users.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn attach_analysis(&self, user_id: &str, data: UserData) -> Result<(), StorageError> {
        let mut record = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)))?;
        record.data = Some(data);
        Ok(())
    }

    async fn load_score_config(
        &self,
        name: &str,
    ) -> Result<Option<StoredScoreConfig>, StorageError> {
        Ok(self.configs.get(name).map(|c| c.clone()))
    }

    async fn upsert_score(&self, score: &ScoreResult) -> Result<(), StorageError> {
        self.scores.insert(score.user_id.clone(), score.clone());
        Ok(())
    }

    async fn upsert_worth(&self, worth: &DeveloperWorth) -> Result<(), StorageError> {
        self.worths.insert(worth.user_id.clone(), worth.clone());
        Ok(())
    }

    async fn load_score(&self, user_id: &str) -> Result<Option<ScoreResult>, StorageError> {
        Ok(self.scores.get(user_id).map(|s| s.clone()))
    }

    async fn load_worth(&self, user_id: &str) -> Result<Option<DeveloperWorth>, StorageError> {
        Ok(self.worths.get(user_id).map(|w| w.clone()))
    }
}
