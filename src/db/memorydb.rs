// db/memorydb.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::gamificationdb::{GamificationRepository, RepositoryError};
use crate::models::gamificationmodel::{GamificationRecord, LeaderboardStanding};
use crate::services::leaderboard::top_by_xp;

#[derive(Debug)]
struct StoredRecord {
    seq: u64,
    record: GamificationRecord,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<Uuid, StoredRecord>,
    next_seq: u64,
}

/// Process-local store with the same compare-and-swap contract as the
/// PostgreSQL repository.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl GamificationRepository for InMemoryStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<GamificationRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.records.get(&user_id).map(|s| s.record.clone()))
    }

    async fn save(&self, record: &GamificationRecord) -> Result<GamificationRecord, RepositoryError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let existing = state
            .records
            .get(&record.user_id)
            .map(|s| (s.seq, s.record.version));

        if existing.map(|(_, version)| version).unwrap_or(0) != record.version {
            return Err(RepositoryError::VersionConflict {
                user_id: record.user_id,
                expected: record.version,
            });
        }

        let mut next = record.clone();
        next.normalize();
        next.version = record.version + 1;

        let seq = match existing {
            Some((seq, _)) => seq,
            None => {
                state.next_seq += 1;
                state.next_seq
            }
        };

        state.records.insert(
            record.user_id,
            StoredRecord {
                seq,
                record: next.clone(),
            },
        );

        Ok(next)
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardStanding>, RepositoryError> {
        let state = self.state.read().await;

        let mut stored: Vec<&StoredRecord> = state.records.values().collect();
        stored.sort_by_key(|s| s.seq);

        Ok(top_by_xp(stored.into_iter().map(|s| &s.record), limit))
    }

    async fn count_with_more_xp(&self, total_xp: i64) -> Result<i64, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .filter(|s| s.record.total_xp > total_xp)
            .count() as i64)
    }
}
