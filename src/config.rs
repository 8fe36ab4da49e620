use std::env;
use thiserror::Error;

use crate::models::KarmaTable;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // Voting
    pub topic_max_choices: i32,

    // Karma
    pub karma: KarmaTable,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: positive("DATABASE_MAX_CONNECTIONS", 20)?.unsigned_abs(),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            topic_max_choices: positive("TOPIC_MAX_CHOICES", 10)?,

            karma: KarmaTable {
                topic_created: positive("KARMA_TOPIC_CREATED", 10)?,
                comment_created: positive("KARMA_COMMENT_CREATED", 2)?,
                topic_vote_cast: positive("KARMA_TOPIC_VOTE_CAST", 1)?,
                vote_received: positive("KARMA_VOTE_RECEIVED", 1)?,
            },
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn positive(key: &'static str, default: i32) -> Result<i32, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_positive(key, &value),
        Err(_) => Ok(default),
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<i32, ConfigError> {
    match value.trim().parse::<i32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
