//! Engine configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

/// Environment variable holding the shared callback secret.
pub const AUTH_KEY_ENV: &str = "POUSSETACHES_AUTH_KEY";
/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "POUSSETACHES_DATA_DIR";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base directory for the waiting/success/dead buckets.
    pub data_dir: PathBuf,
    /// Shared secret sent on every callback POST.
    pub auth_key: String,
    /// Number of delivery workers.
    pub workers: usize,
    /// How long an idle worker sleeps before polling the queue again.
    pub poll_interval: Duration,
    /// Success-archive retention enforced at boot.
    pub max_success: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("poussetaches_data"),
            auth_key: String::new(),
            workers: 2,
            poll_interval: Duration::from_millis(200),
            max_success: 1000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build the configuration from environment variables, falling back to
    /// the defaults above.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var(AUTH_KEY_ENV) {
            config.auth_key = key;
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }
}
