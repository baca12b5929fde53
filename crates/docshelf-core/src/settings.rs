//! Application settings
//!
//! User preferences (theme, inbox folder) live in their own aggregate and
//! snapshot, separate from the archive. The `SettingsService` owns the
//! loaded settings, persists after every change and announces theme
//! switches on the event bus.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::events::{ArchiveEvent, EventBus};
use crate::models::CURRENT_APP_VERSION;
use crate::storage::{SettingsGateway, StorageResult};

/// Persisted user preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSettings {
    pub application_version: String,
    pub date_created: DateTime<Utc>,
    pub date_last_modified: DateTime<Utc>,
    #[serde(default)]
    pub light_theme_active: bool,
    #[serde(default)]
    pub inbox_folder_path: Option<PathBuf>,
}

impl ApplicationSettings {
    /// Defaults for a tenant without a settings snapshot
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            application_version: CURRENT_APP_VERSION.to_string(),
            date_created: now,
            date_last_modified: now,
            light_theme_active: false,
            inbox_folder_path: None,
        }
    }

    pub fn set_light_theme_active(&mut self, active: bool) {
        self.light_theme_active = active;
        self.touch();
    }

    pub fn set_inbox_folder_path(&mut self, path: Option<PathBuf>) {
        self.inbox_folder_path = path;
        self.touch();
    }

    fn touch(&mut self) {
        self.date_last_modified = Utc::now().max(self.date_last_modified);
    }
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self::empty()
    }
}

/// Owns the settings aggregate for the process lifetime
pub struct SettingsService {
    settings: ApplicationSettings,
    gateway: Box<dyn SettingsGateway>,
    events: Arc<EventBus>,
}

impl SettingsService {
    /// Load settings through `gateway`
    pub fn open(gateway: Box<dyn SettingsGateway>, events: Arc<EventBus>) -> StorageResult<Self> {
        let settings = gateway.load_settings()?;
        Ok(Self {
            settings,
            gateway,
            events,
        })
    }

    pub fn settings(&self) -> &ApplicationSettings {
        &self.settings
    }

    pub fn is_light_theme_active(&self) -> bool {
        self.settings.light_theme_active
    }

    /// Flip the theme, persist, and announce the new value
    pub fn toggle_light_theme(&mut self) -> StorageResult<bool> {
        let active = !self.settings.light_theme_active;
        self.settings.set_light_theme_active(active);
        self.gateway.save_settings(&self.settings)?;
        self.events.publish(ArchiveEvent::LightThemeChanged(active));
        Ok(active)
    }

    pub fn inbox_folder_path(&self) -> Option<&Path> {
        self.settings.inbox_folder_path.as_deref()
    }

    /// Set (or clear) the inbox folder and persist
    pub fn set_inbox_folder_path(&mut self, path: Option<PathBuf>) -> StorageResult<()> {
        self.settings.set_inbox_folder_path(path);
        self.gateway.save_settings(&self.settings)
    }

    /// Final save before exit; failures are logged, not returned
    pub fn shutdown(self) {
        match self.gateway.save_settings(&self.settings) {
            Ok(()) => info!("Settings saved on shutdown"),
            Err(e) => warn!("Failed to save settings on shutdown: {}", e),
        }
    }
}
