// src/config.rs
use crate::engine::view::DEFAULT_PAGE_SIZE;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_COLLECTION: &str = "applications";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub db_path: String,
    pub collection: String,
    pub page_size: usize,
    pub workers: usize,
    /// `None` disables the store change watcher.
    pub watch_interval: Option<Duration>,
    /// `None` means no presence store: everyone shows offline, online count is 0.
    pub presence_url: Option<String>,
    pub presence_auth: Option<String>,
    pub seed_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            db_path: "loan_desk.sqlite3".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            workers: 8,
            watch_interval: Some(Duration::from_millis(1000)),
            presence_url: None,
            presence_auth: None,
            seed_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(v) = get("LOAN_DESK_ADDR") {
            cfg.addr = v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "LOAN_DESK_ADDR",
                value: v.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(v) = get("LOAN_DESK_DB") {
            cfg.db_path = v;
        }
        if let Some(v) = get("LOAN_DESK_COLLECTION") {
            cfg.collection = v;
        }
        if let Some(v) = get("LOAN_DESK_PAGE_SIZE") {
            cfg.page_size = positive("LOAN_DESK_PAGE_SIZE", &v)?;
        }
        if let Some(v) = get("LOAN_DESK_WORKERS") {
            cfg.workers = positive("LOAN_DESK_WORKERS", &v)?;
        }
        if let Some(v) = get("LOAN_DESK_WATCH_MS") {
            let ms: u64 = v.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: "LOAN_DESK_WATCH_MS",
                value: v.clone(),
                reason: e.to_string(),
            })?;
            cfg.watch_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        cfg.presence_url = get("LOAN_DESK_PRESENCE_URL");
        cfg.presence_auth = get("LOAN_DESK_PRESENCE_AUTH");
        cfg.seed_file = get("LOAN_DESK_SEED").map(PathBuf::from);

        Ok(cfg)
    }
}

fn positive(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be at least 1".into(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}
