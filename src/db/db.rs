// db/db.rs
use redis::aio::ConnectionManager;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use super::cache::LEADERBOARD_CACHE_TTL;

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
    pub redis_client: Option<Arc<ConnectionManager>>,
    pub leaderboard_ttl: usize,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("redis_client", &self.redis_client.is_some())
            .field("leaderboard_ttl", &self.leaderboard_ttl)
            .finish()
    }
}

impl DBClient {
    /// Create a new DBClient with PostgreSQL pool only
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient {
            pool,
            redis_client: None,
            leaderboard_ttl: LEADERBOARD_CACHE_TTL,
        }
    }

    /// Create a new DBClient with both PostgreSQL and Redis. A Redis that
    /// cannot be reached leaves the client running without cache.
    pub async fn with_redis(pool: Pool<Postgres>, redis_url: &str, leaderboard_ttl: usize) -> Self {
        let redis_client = match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("✅ Redis connection established successfully");
                    Some(Arc::new(conn))
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to connect to Redis: {}. Continuing without cache.", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("⚠️ Failed to create Redis client: {}. Continuing without cache.", e);
                None
            }
        };

        DBClient {
            pool,
            redis_client,
            leaderboard_ttl,
        }
    }

    /// Get cache status for monitoring
    pub fn cache_status(&self) -> &str {
        if self.redis_client.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    }
}
