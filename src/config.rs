use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub pagination: PaginationConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded recipe images are written to
    pub root: String,
    /// Public URL prefix the root is served under
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

/// Bounds enforced on recipe writes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub min_cooking_time: i64,
    pub max_cooking_time: i64,
    pub min_amount: i64,
    pub max_amount: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 6,
            max_page_size: 100,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_cooking_time: 1,
            max_cooking_time: 350,
            min_amount: 1,
            max_amount: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let pagination = PaginationConfig::default();
        let limits = LimitsConfig::default();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/foodgram.db".to_string()),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 8000),
            },
            media: MediaConfig {
                root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
                url: env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string()),
            },
            pagination: PaginationConfig {
                page_size: parse_var("PAGE_SIZE", pagination.page_size),
                max_page_size: parse_var("MAX_PAGE_SIZE", pagination.max_page_size),
            },
            limits: LimitsConfig {
                min_cooking_time: parse_var("MIN_COOKING_TIME", limits.min_cooking_time),
                max_cooking_time: parse_var("MAX_COOKING_TIME", limits.max_cooking_time),
                min_amount: parse_var("MIN_AMOUNT", limits.min_amount),
                max_amount: parse_var("MAX_AMOUNT", limits.max_amount),
            },
        })
    }

    /// Configuration for tests and tooling: in-memory database, defaults elsewhere
    pub fn in_memory(media_root: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            media: MediaConfig {
                root: media_root.into(),
                url: "/media/".to_string(),
            },
            pagination: PaginationConfig::default(),
            limits: LimitsConfig::default(),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
