mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod services;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::{Config, StoreKind};
use db::{db::DBClient, gamificationdb::GamificationRepository, memorydb::InMemoryStore};
use dotenv::dotenv;
use routes::create_router;
use service::gamification_service::GamificationService;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub gamification_service: Arc<GamificationService>,
}

async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn GamificationRepository>> {
    match config.store {
        StoreKind::Memory => {
            tracing::warn!("⚠️  STORE=memory - records are lost when the process exits");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("🔥 Failed to connect to the database")?;
            tracing::info!("✅ Connection to the database is successful!");

            let db_client = match config.redis_url {
                Some(ref redis_url) => {
                    DBClient::with_redis(pool, redis_url, config.leaderboard_cache_ttl).await
                }
                None => {
                    tracing::info!("ℹ️  Redis not configured - Running without cache (set REDIS_URL to enable)");
                    DBClient::new(pool)
                }
            };
            tracing::info!("📊 Cache status: {}", db_client.cache_status());

            Ok(Arc::new(db_client))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::init()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let repository = build_repository(&config).await?;
    let gamification_service = Arc::new(GamificationService::new(
        repository,
        config.gamification_settings(),
    ));

    let allowed_origins = config
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("ALLOWED_ORIGINS contains an invalid origin")?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST]);

    let app_state = Arc::new(AppState {
        env: config.clone(),
        gamification_service,
    });

    let app = create_router(app_state).layer(cors);

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    axum::serve(listener, app).await?;

    Ok(())
}
