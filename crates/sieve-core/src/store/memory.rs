use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PolicyStore;
use crate::{CoreError, Result, Settings};

/// Process-local policy store.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    configs: RwLock<HashMap<String, Settings>>,
}

impl MemoryPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `settings`.
    pub fn with_configs(settings: impl IntoIterator<Item = Settings>) -> Self {
        let configs = settings.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            configs: RwLock::new(configs),
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get_config(&self, id: &str) -> Result<Settings> {
        self.configs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(id))
    }

    async fn update_config(&self, settings: &Settings) -> Result<()> {
        self.configs
            .write()
            .await
            .insert(settings.id.clone(), settings.clone());
        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<()> {
        self.configs.write().await.remove(id);
        Ok(())
    }

    async fn get_all_configs(&self) -> Result<Vec<Settings>> {
        Ok(self.configs.read().await.values().cloned().collect())
    }
}
