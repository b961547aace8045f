//! Preset management behind the HTTP API.

use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};
use sieve_core::{CoreError, PolicyStore, PresetCategory, PresetFields, PresetResponse, Settings};
use tracing::{debug, info};

use crate::SrvError;

/// Alphabet for generated IDs. Safe as a DNS label.
const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generated ID length.
pub const ID_LENGTH: usize = 7;

/// Attempts at finding an unused ID.
const ID_ATTEMPTS: usize = 3;

/// Create, read, update and delete presets.
pub struct PresetService {
    store: Arc<dyn PolicyStore>,
    categories: Vec<String>,
    rng: SystemRandom,
}

impl std::fmt::Debug for PresetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresetService")
            .field("categories", &self.categories)
            .finish_non_exhaustive()
    }
}

impl PresetService {
    /// Create a service. `categories` are the names every new preset lists.
    pub fn new(store: Arc<dyn PolicyStore>, categories: Vec<String>) -> Self {
        Self {
            store,
            categories,
            rng: SystemRandom::new(),
        }
    }

    /// Create a preset under a fresh ID.
    ///
    /// Only the name, enabled flag and offset are taken from `request`. Every
    /// configured category starts `inactive` and there is no schedule.
    pub async fn add(&self, request: &PresetFields) -> crate::Result<PresetResponse> {
        let id = self.allocate_id().await?;

        let fields = PresetFields {
            name: request.name.clone(),
            enabled: request.enabled,
            utc_offset: request.utc_offset,
            categories: self
                .categories
                .iter()
                .map(|name| PresetCategory {
                    name: name.clone(),
                    status: String::from("inactive"),
                })
                .collect(),
            schedule: Vec::new(),
        };
        let settings = Settings::from_preset(id, &fields)?;
        self.store.update_config(&settings).await?;

        info!(id = %settings.id, name = %settings.name, "Preset created");
        Ok(PresetResponse::from(&settings))
    }

    /// Fetch a preset.
    pub async fn get(&self, id: &str) -> crate::Result<PresetResponse> {
        let settings = self.store.get_config(id).await?;
        Ok(PresetResponse::from(&settings))
    }

    /// Replace a preset's contents.
    pub async fn update(&self, id: &str, fields: &PresetFields) -> crate::Result<PresetResponse> {
        let settings = Settings::from_preset(id, fields)?;
        self.store.update_config(&settings).await?;
        debug!(id, "Preset updated");
        Ok(PresetResponse::from(&settings))
    }

    /// Remove a preset. Missing presets are not an error.
    pub async fn delete(&self, id: &str) -> crate::Result<()> {
        self.store.delete_config(id).await?;
        info!(id, "Preset deleted");
        Ok(())
    }

    /// Enable or disable filtering for a preset.
    pub async fn set_state(&self, id: &str, enabled: bool) -> crate::Result<()> {
        let mut settings = self.store.get_config(id).await?;
        settings.enabled = enabled;
        self.store.update_config(&settings).await?;
        debug!(id, enabled, "Preset state changed");
        Ok(())
    }

    /// All presets, ordered by ID.
    pub async fn list(&self) -> crate::Result<Vec<PresetResponse>> {
        let mut presets: Vec<PresetResponse> = self
            .store
            .get_all_configs()
            .await?
            .iter()
            .map(PresetResponse::from)
            .collect();
        presets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(presets)
    }

    async fn allocate_id(&self) -> crate::Result<String> {
        for _ in 0..ID_ATTEMPTS {
            let id = generate_id(&self.rng)?;
            if !self.store.contains(&id).await? {
                return Ok(id);
            }
            debug!(id = %id, "Generated preset ID already taken");
        }
        Err(CoreError::Store(format!("no free preset ID after {ID_ATTEMPTS} attempts")).into())
    }
}

/// Random ID of [`ID_LENGTH`] characters from `[a-z0-9]`.
pub fn generate_id(rng: &dyn SecureRandom) -> crate::Result<String> {
    let mut bytes = [0u8; ID_LENGTH];
    rng.fill(&mut bytes)
        .map_err(|_| SrvError::Server("system random source unavailable".into()))?;
    Ok(bytes
        .iter()
        .map(|b| char::from(ID_CHARSET[usize::from(*b) % ID_CHARSET.len()]))
        .collect())
}
