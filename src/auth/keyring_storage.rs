use async_trait::async_trait;
use keyring::{Entry, Error as KeyringError};
use log::{debug, error};

use super::secure_storage_trait::SecureStorage;
use crate::error::{AppError, AppResult};

/// OS credential store: one keyring entry per key under a single service name.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> AppResult<Entry> {
        Entry::new(&self.service, key).map_err(|e| {
            error!(
                "Failed to create keyring entry - OS: {:?}, Error: {}",
                std::env::consts::OS,
                e
            );
            AppError::StorageError(format!("Failed to create keyring entry: {}", e))
        })
    }
}

// The keyring calls are blocking platform APIs; they run on the blocking pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::InternalError(format!("Keyring task failed: {}", e)))?
}

#[async_trait]
impl SecureStorage for KeyringStorage {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let entry = self.entry(key)?;
        let value = value.to_string();
        let key = key.to_string();
        blocking(move || {
            entry.set_password(&value).map_err(|e| {
                error!("Failed to store '{}' in keyring: {}", key, e);
                AppError::from(e)
            })?;
            debug!("Keyring entry '{}' saved", key);
            Ok(())
        })
        .await
    }

    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let entry = self.entry(key)?;
        let key = key.to_string();
        blocking(move || match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => {
                debug!("No keyring entry for '{}'", key);
                Ok(None)
            }
            Err(e) => {
                error!("Keyring read of '{}' failed: {}", key, e);
                Err(AppError::from(e))
            }
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        let entry = self.entry(key)?;
        let key = key.to_string();
        blocking(move || match entry.delete_credential() {
            Ok(()) | Err(KeyringError::NoEntry) => {
                debug!("Keyring entry '{}' cleared", key);
                Ok(())
            }
            Err(e) => {
                error!("Failed to clear '{}' from keyring: {}", key, e);
                Err(AppError::from(e))
            }
        })
        .await
    }
}
