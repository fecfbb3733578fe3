use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::secure_storage_trait::SecureStorage;
use crate::error::AppResult;

/// In-memory storage: the session lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        self.items.remove(key);
        Ok(())
    }
}
