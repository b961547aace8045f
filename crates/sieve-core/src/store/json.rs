use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::PolicyStore;
use crate::{CoreError, Result, Settings};

/// Policy store persisted as a JSON array in a single file.
///
/// The whole map is held in memory. Every mutation rewrites the file through
/// a sibling temporary file and a rename, while holding the write lock, so
/// readers of the file never see a partial document.
#[derive(Debug)]
pub struct JsonPolicyStore {
    path: PathBuf,
    configs: RwLock<HashMap<String, Settings>>,
}

impl JsonPolicyStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let configs = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => {
                let list: Vec<Settings> = serde_json::from_slice(&bytes)?;
                list.into_iter().map(|s| (s.id.clone(), s)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), presets = configs.len(), "Opened policy store");

        Ok(Self {
            path,
            configs: RwLock::new(configs),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, configs: &HashMap<String, Settings>) -> Result<()> {
        let mut list: Vec<&Settings> = configs.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        let json = serde_json::to_vec_pretty(&list)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            CoreError::Store(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), presets = list.len(), "Persisted policy store");
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for JsonPolicyStore {
    async fn get_config(&self, id: &str) -> Result<Settings> {
        self.configs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(id))
    }

    async fn update_config(&self, settings: &Settings) -> Result<()> {
        let mut configs = self.configs.write().await;
        let previous = configs.insert(settings.id.clone(), settings.clone());
        if let Err(e) = self.persist(&configs).await {
            // Keep memory and disk in step.
            match previous {
                Some(old) => configs.insert(old.id.clone(), old),
                None => configs.remove(&settings.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<()> {
        let mut configs = self.configs.write().await;
        if configs.remove(id).is_none() {
            return Ok(());
        }
        self.persist(&configs).await
    }

    async fn get_all_configs(&self) -> Result<Vec<Settings>> {
        Ok(self.configs.read().await.values().cloned().collect())
    }
}
