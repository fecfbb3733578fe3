use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::api_clients::retry_policy::RetryPolicy;
use crate::constants::{
    APP_DATA_DIR_NAME, DEFAULT_API_BASE_URL, DEFAULT_API_MAX_RETRIES, DEFAULT_API_TIMEOUT_MS,
    DEFAULT_HEALTH_CHECK_INTERVAL_MS, DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_TOKEN_REFRESH_INTERVAL_MS,
    DEFAULT_TOKEN_WARNING_TIME_MS,
};
use crate::error::{AppError, AppResult};
use crate::utils::env_utils::read_var_with;

/// Where the session token and user profile are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file under the app data directory (the localStorage analogue).
    File,
    /// OS credential store.
    Keyring,
    /// Process memory only; the session does not survive a restart.
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "file" => Some(StorageBackend::File),
            "keyring" => Some(StorageBackend::Keyring),
            "memory" | "session" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub refresh_interval: Duration,
    pub warning_threshold: Duration,
    pub storage_backend: StorageBackend,
    pub storage_dir: Option<PathBuf>,
    pub retry_policy: RetryPolicy,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_API_TIMEOUT_MS),
            refresh_interval: Duration::from_millis(DEFAULT_TOKEN_REFRESH_INTERVAL_MS),
            warning_threshold: Duration::from_millis(DEFAULT_TOKEN_WARNING_TIME_MS),
            storage_backend: StorageBackend::File,
            storage_dir: None,
            retry_policy: RetryPolicy::default(),
            health_check_interval: Duration::from_millis(DEFAULT_HEALTH_CHECK_INTERVAL_MS),
            health_check_timeout: Duration::from_millis(DEFAULT_HEALTH_CHECK_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: u64| -> Duration {
            let raw = read_var_with(&lookup, key, &default.to_string(), true);
            match raw.trim().parse::<u64>() {
                Ok(v) => Duration::from_millis(v),
                Err(_) => {
                    warn!("Ignoring non-numeric {}={:?}, using {}ms", key, raw, default);
                    Duration::from_millis(default)
                }
            }
        };

        let base_url = read_var_with(&lookup, "API_BASE_URL", DEFAULT_API_BASE_URL, true);

        let storage_raw = read_var_with(&lookup, "SESSION_STORAGE", "file", true);
        let storage_backend = StorageBackend::parse(&storage_raw).ok_or_else(|| {
            AppError::ConfigError(format!(
                "Unknown SESSION_STORAGE '{}'; expected file, keyring or memory",
                storage_raw
            ))
        })?;

        let storage_dir = lookup("SESSION_STORAGE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let max_retries_raw = read_var_with(
            &lookup,
            "API_MAX_RETRIES",
            &DEFAULT_API_MAX_RETRIES.to_string(),
            true,
        );
        let max_retries = max_retries_raw
            .trim()
            .parse::<u32>()
            .unwrap_or(DEFAULT_API_MAX_RETRIES);

        let retry_policy = RetryPolicy {
            max_retries,
            base_delay: millis("API_RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: millis("API_RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS),
            jitter: true,
        };

        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: millis("API_TIMEOUT_MS", DEFAULT_API_TIMEOUT_MS),
            refresh_interval: millis("TOKEN_REFRESH_INTERVAL", DEFAULT_TOKEN_REFRESH_INTERVAL_MS),
            warning_threshold: millis("TOKEN_WARNING_TIME", DEFAULT_TOKEN_WARNING_TIME_MS),
            storage_backend,
            storage_dir,
            retry_policy,
            health_check_interval: millis(
                "HEALTH_CHECK_INTERVAL_MS",
                DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            ),
            health_check_timeout: millis(
                "HEALTH_CHECK_TIMEOUT_MS",
                DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            ),
        };

        config.validate()?;
        info!(
            "Client configuration loaded: base_url={}, storage={:?}",
            config.base_url, config.storage_backend
        );
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "API_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(AppError::ConfigError(
                "TOKEN_REFRESH_INTERVAL must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory for file-backed session storage.
    pub fn resolved_storage_dir(&self) -> AppResult<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|d| d.join(APP_DATA_DIR_NAME))
            .ok_or_else(|| {
                AppError::ConfigError(
                    "No local data directory available; set SESSION_STORAGE_DIR".to_string(),
                )
            })
    }

    /// Join an API path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
