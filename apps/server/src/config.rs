use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

use crate::auth::{decode_secret_key, AuthConfig};

const DEFAULT_REQUIRED_KEYS: &str = "TD_JWT_SECRET,TD_UPSTREAM_URL";

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub static_dir: String,
    /// `None` disables authentication for the whole API.
    pub auth: Option<AuthConfig>,
    /// Base URL mutations are flushed to; `None` keeps the queue offline.
    pub upstream_url: Option<String>,
    /// JSON file backing the sync queue; `None` keeps it in memory.
    pub sync_queue_path: Option<PathBuf>,
    pub sync_max_attempts: u32,
    pub sync_debounce: Duration,
    /// Keys the health endpoint requires to report `ok`.
    pub required_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(30_000),
            static_dir: "dist".to_string(),
            auth: None,
            upstream_url: None,
            sync_queue_path: None,
            sync_max_attempts: tenderdesk_core::sync::DEFAULT_MAX_ATTEMPTS,
            sync_debounce: Duration::from_millis(1_000),
            required_keys: split_list(DEFAULT_REQUIRED_KEYS),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match non_empty_var("TD_LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid TD_LISTEN_ADDR: {raw}"))?,
            None => defaults.listen_addr,
        };
        let cors_allow = non_empty_var("TD_CORS_ALLOW_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or(defaults.cors_allow);
        let timeout_ms: u64 = non_empty_var("TD_REQUEST_TIMEOUT_MS")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(30_000);
        let static_dir = non_empty_var("TD_STATIC_DIR").unwrap_or(defaults.static_dir);

        let auth = match non_empty_var("TD_JWT_SECRET") {
            Some(secret) => {
                let ttl_minutes: u64 = non_empty_var("TD_ACCESS_TOKEN_TTL_MINUTES")
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(60);
                Some(AuthConfig {
                    jwt_secret: decode_secret_key(&secret)?,
                    password_hash: non_empty_var("TD_AUTH_PASSWORD_HASH"),
                    access_token_ttl: Duration::from_secs(ttl_minutes * 60),
                })
            }
            None => None,
        };

        let upstream_url =
            non_empty_var("TD_UPSTREAM_URL").map(|url| url.trim_end_matches('/').to_string());
        let sync_queue_path = non_empty_var("TD_SYNC_QUEUE_PATH").map(PathBuf::from);
        let sync_max_attempts = non_empty_var("TD_SYNC_MAX_ATTEMPTS")
            .and_then(|raw| raw.parse().ok())
            .filter(|attempts| *attempts > 0)
            .unwrap_or(defaults.sync_max_attempts);
        let sync_debounce = non_empty_var("TD_SYNC_DEBOUNCE_MS")
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.sync_debounce);
        let required_keys = non_empty_var("TD_REQUIRED_KEYS")
            .map(|raw| split_list(&raw))
            .unwrap_or(defaults.required_keys);

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            static_dir,
            auth,
            upstream_url,
            sync_queue_path,
            sync_max_attempts,
            sync_debounce,
            required_keys,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
