// config.rs
use anyhow::{anyhow, Context};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::cache::LEADERBOARD_CACHE_TTL,
    service::gamification_service::{GamificationSettings, DEFAULT_DAILY_LOGIN_XP},
    services::streak_tracker::{DayBoundary, StreakPolicy, DEFAULT_STREAK_MILESTONE_XP},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub log_level: LevelFilter,
    pub leaderboard_cache_ttl: usize,
    pub day_boundary: DayBoundary,
    pub daily_login_xp: i64,
    pub streak_milestone_xp: i64,
}

impl Config {
    pub fn init() -> anyhow::Result<Config> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `init` reads the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("STORE").as_deref().unwrap_or("postgres") {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => return Err(anyhow!("STORE must be 'postgres' or 'memory', got '{}'", other)),
        };

        let database_url = lookup("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set"));
        }

        let jwt_secret = lookup("JWT_SECRET_KEY").ok_or_else(|| anyhow!("JWT_SECRET_KEY must be set"))?;

        let redis_url = lookup("REDIS_URL").filter(|url| !url.is_empty());

        let port = parse_or(&lookup, "PORT", 8000u16)?;
        let leaderboard_cache_ttl = parse_or(&lookup, "LEADERBOARD_CACHE_TTL", LEADERBOARD_CACHE_TTL)?;
        let daily_login_xp = parse_or(&lookup, "DAILY_LOGIN_XP", DEFAULT_DAILY_LOGIN_XP)?;
        let streak_milestone_xp = parse_or(&lookup, "STREAK_MILESTONE_XP", DEFAULT_STREAK_MILESTONE_XP)?;

        if daily_login_xp < 0 || streak_milestone_xp < 0 {
            return Err(anyhow!("DAILY_LOGIN_XP and STREAK_MILESTONE_XP must be non-negative"));
        }

        let day_boundary = match lookup("STREAK_DAY_BOUNDARY") {
            Some(value) => value.parse::<DayBoundary>().map_err(|e| anyhow!(e))?,
            None => DayBoundary::default(),
        };

        let log_level = match lookup("LOG_LEVEL") {
            Some(value) => value
                .parse::<LevelFilter>()
                .with_context(|| format!("LOG_LEVEL '{}' is not a valid level", value))?,
            None => LevelFilter::DEBUG,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["http://localhost:5173".to_string(), "http://localhost:3000".to_string()]);

        Ok(Config {
            store,
            database_url,
            redis_url,
            jwt_secret,
            port,
            allowed_origins,
            log_level,
            leaderboard_cache_ttl,
            day_boundary,
            daily_login_xp,
            streak_milestone_xp,
        })
    }

    pub fn gamification_settings(&self) -> GamificationSettings {
        GamificationSettings {
            streak: StreakPolicy {
                day_boundary: self.day_boundary,
                milestone_xp: self.streak_milestone_xp,
            },
            daily_login_xp: self.daily_login_xp,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/lms"), ("JWT_SECRET_KEY", "s")]).unwrap();
        assert_eq!(config.store, StoreKind::Postgres);
        assert_eq!(config.port, 8000);
        assert_eq!(config.day_boundary, DayBoundary::Calendar);
        assert_eq!(config.redis_url, None);

        let settings = config.gamification_settings();
        assert_eq!(settings.daily_login_xp, 10);
        assert_eq!(settings.streak.milestone_xp, 50);
    }

    #[test]
    fn memory_store_needs_no_database() {
        let config = config_from(&[
            ("STORE", "memory"),
            ("JWT_SECRET_KEY", "s"),
            ("STREAK_DAY_BOUNDARY", "elapsed"),
            ("LOG_LEVEL", "info"),
            ("ALLOWED_ORIGINS", "https://lms.example.com, http://localhost:5173"),
        ])
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.day_boundary, DayBoundary::Elapsed);
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn missing_or_bad_values_fail() {
        assert!(config_from(&[("JWT_SECRET_KEY", "s")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "x")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "x"), ("JWT_SECRET_KEY", "s"), ("PORT", "http")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "x"), ("JWT_SECRET_KEY", "s"), ("DAILY_LOGIN_XP", "-1")]).is_err());
    }
}
