// db/gamificationdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

use super::cache::{CacheHelper, LEADERBOARD_CACHE_KEY};
use super::db::DBClient;

use crate::models::gamificationmodel::{
    Activity, Badge, GamificationRecord, GamificationStats, LeaderboardStanding,
};
use crate::services::leaderboard::MAX_LEADERBOARD_LIMIT;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stale write for user {user_id}: expected version {expected}")]
    VersionConflict { user_id: Uuid, expected: i64 },
}

/// Store boundary for gamification records.
///
/// `save` is a compare-and-swap on `version`: it succeeds only when the
/// stored record still has the version the caller loaded, and returns the
/// stored record with its new version.
#[async_trait]
pub trait GamificationRepository: Send + Sync {
    async fn load(&self, user_id: Uuid) -> Result<Option<GamificationRecord>, RepositoryError>;

    async fn save(&self, record: &GamificationRecord) -> Result<GamificationRecord, RepositoryError>;

    /// Highest XP first, ties in insertion order.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardStanding>, RepositoryError>;

    async fn count_with_more_xp(&self, total_xp: i64) -> Result<i64, RepositoryError>;
}

#[derive(Debug, sqlx::FromRow)]
struct GamificationRow {
    user_id: Uuid,
    total_xp: i64,
    current_streak: i32,
    longest_streak: i32,
    last_activity_date: Option<DateTime<Utc>>,
    badges: Json<Vec<Badge>>,
    activities: Json<Vec<Activity>>,
    stats: Json<GamificationStats>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GamificationRow> for GamificationRecord {
    fn from(row: GamificationRow) -> Self {
        let mut record = GamificationRecord {
            user_id: row.user_id,
            total_xp: row.total_xp,
            current_level: 0,
            xp_to_next_level: 0,
            current_streak: row.current_streak,
            longest_streak: row.longest_streak,
            last_activity_date: row.last_activity_date,
            badges: row.badges.0,
            activities: row.activities.0,
            stats: row.stats.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        };
        record.normalize();
        record
    }
}

impl DBClient {
    async fn invalidate_leaderboard(&self) {
        if let Some(redis) = &self.redis_client {
            if let Err(e) = CacheHelper::delete(redis, LEADERBOARD_CACHE_KEY).await {
                tracing::warn!("⚠️ Failed to invalidate leaderboard cache: {}", e);
            }
        }
    }
}

#[async_trait]
impl GamificationRepository for DBClient {
    async fn load(&self, user_id: Uuid) -> Result<Option<GamificationRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, GamificationRow>(
            r#"
            SELECT
                user_id, total_xp, current_streak, longest_streak, last_activity_date,
                badges, activities, stats, version, created_at, updated_at
            FROM gamification_records
            WHERE user_id = $1
            "#
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(GamificationRecord::from))
    }

    async fn save(&self, record: &GamificationRecord) -> Result<GamificationRecord, RepositoryError> {
        let mut record = record.clone();
        record.normalize();

        let row = sqlx::query_as::<_, GamificationRow>(
            r#"
            INSERT INTO gamification_records (
                user_id, total_xp, current_level, xp_to_next_level,
                current_streak, longest_streak, last_activity_date,
                badges, activities, stats, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1, $11, $12)
            ON CONFLICT (user_id) DO UPDATE SET
                total_xp = EXCLUDED.total_xp,
                current_level = EXCLUDED.current_level,
                xp_to_next_level = EXCLUDED.xp_to_next_level,
                current_streak = EXCLUDED.current_streak,
                longest_streak = EXCLUDED.longest_streak,
                last_activity_date = EXCLUDED.last_activity_date,
                badges = EXCLUDED.badges,
                activities = EXCLUDED.activities,
                stats = EXCLUDED.stats,
                updated_at = EXCLUDED.updated_at,
                version = gamification_records.version + 1
            WHERE gamification_records.version = $13
            RETURNING
                user_id, total_xp, current_streak, longest_streak, last_activity_date,
                badges, activities, stats, version, created_at, updated_at
            "#
        )
        .bind(record.user_id)
        .bind(record.total_xp)
        .bind(record.current_level)
        .bind(record.xp_to_next_level)
        .bind(record.current_streak)
        .bind(record.longest_streak)
        .bind(record.last_activity_date)
        .bind(Json(&record.badges))
        .bind(Json(&record.activities))
        .bind(Json(&record.stats))
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.version)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(RepositoryError::VersionConflict {
                user_id: record.user_id,
                expected: record.version,
            });
        };

        self.invalidate_leaderboard().await;

        Ok(GamificationRecord::from(row))
    }

    /// One cached page of the top `MAX_LEADERBOARD_LIMIT` standings serves
    /// every smaller limit.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardStanding>, RepositoryError> {
        if let Some(redis) = &self.redis_client {
            match CacheHelper::get::<Vec<LeaderboardStanding>>(redis, LEADERBOARD_CACHE_KEY).await {
                Ok(Some(mut standings)) => {
                    standings.truncate(limit);
                    return Ok(standings);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("⚠️ Leaderboard cache read failed: {}", e),
            }
        }

        let mut standings = sqlx::query_as::<_, LeaderboardStanding>(
            r#"
            SELECT
                user_id,
                total_xp,
                current_streak,
                jsonb_array_length(badges)::BIGINT AS badge_count
            FROM gamification_records
            ORDER BY total_xp DESC, seq ASC
            LIMIT $1
            "#
        )
        .bind(MAX_LEADERBOARD_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        if let Some(redis) = &self.redis_client {
            if let Err(e) = CacheHelper::set(redis, LEADERBOARD_CACHE_KEY, &standings, self.leaderboard_ttl).await {
                tracing::warn!("⚠️ Leaderboard cache write failed: {}", e);
            }
        }

        standings.truncate(limit);
        Ok(standings)
    }

    async fn count_with_more_xp(&self, total_xp: i64) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM gamification_records WHERE total_xp > $1"
        )
        .bind(total_xp)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
