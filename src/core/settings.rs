use super::cache::{KeyValueCollection, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SETTINGS_KEY: &str = "mpm_settings_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Overlay real quotes on the watchlist.
    pub live: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings { live: true }
    }
}

pub struct SettingsStore {
    collection: Arc<dyn KeyValueCollection>,
    settings: Settings,
}

impl SettingsStore {
    pub async fn load(collection: Arc<dyn KeyValueCollection>) -> Self {
        let settings = match collection.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring corrupt settings: {}", e);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("Could not read settings: {}", e);
                Settings::default()
            }
        };

        Self {
            collection,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Flips live mode and saves. Returns the new value. Settings stay as
    /// they were if the save fails.
    pub async fn toggle_live(&mut self) -> Result<bool, StoreError> {
        let next = Settings {
            live: !self.settings.live,
        };
        write_settings(self.collection.as_ref(), &next).await?;
        self.settings = next;
        Ok(self.settings.live)
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        write_settings(self.collection.as_ref(), &self.settings).await
    }
}

async fn write_settings(
    collection: &dyn KeyValueCollection,
    settings: &Settings,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(settings)?;
    collection.put(SETTINGS_KEY, &raw).await?;
    debug!("Saved settings: {:?}", settings);
    Ok(())
}
