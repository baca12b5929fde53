//! Snapshot persistence
//!
//! Saves and loads the archive and settings snapshots as pretty-printed
//! JSON in the tenant directory. Uses atomic writes (write to temp file,
//! then rename) so a crash never leaves a half-written snapshot.
//!
//! Files:
//! - `archive.json` - The archive snapshot
//! - `settings.json` - The settings snapshot

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use super::{ArchiveGateway, SettingsGateway};
use crate::config::Config;
use crate::models::{Archive, ArchiveEntry, Tag, CURRENT_APP_VERSION};
use crate::settings::ApplicationSettings;

/// Archive snapshot as written to disk
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveSnapshotOut<'a> {
    application_version: &'a str,
    date_created: DateTime<Utc>,
    date_last_modified: DateTime<Utc>,
    archive_entries: BTreeMap<Uuid, &'a ArchiveEntry>,
    tags: BTreeSet<Tag>,
}

/// Archive snapshot as read from disk
///
/// `tags` is derived data and is recomputed from the entries, so it is
/// not read back. Unknown fields are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveSnapshotIn {
    #[serde(default = "default_version")]
    application_version: String,
    date_created: DateTime<Utc>,
    date_last_modified: DateTime<Utc>,
    #[serde(default)]
    archive_entries: HashMap<Uuid, ArchiveEntry>,
}

fn default_version() -> String {
    CURRENT_APP_VERSION.to_string()
}

/// Persistence layer for archive and settings snapshots
pub struct SnapshotPersistence {
    config: Config,
}

impl SnapshotPersistence {
    /// Create a new persistence handler with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if an archive snapshot exists on disk
    pub fn archive_exists(&self) -> bool {
        self.config.archive_path().exists()
    }

    /// Check if a settings snapshot exists on disk
    pub fn settings_exist(&self) -> bool {
        self.config.settings_path().exists()
    }

    /// Load the archive, or an empty one if no snapshot exists
    pub fn load_archive(&self) -> StorageResult<Archive> {
        let path = self.config.archive_path();
        let Some(snapshot) = read_snapshot::<ArchiveSnapshotIn>(&path)? else {
            info!("No archive snapshot at {:?}, starting empty", path);
            return Ok(Archive::empty());
        };

        let archive = Archive::from_parts(
            snapshot.application_version,
            snapshot.date_created,
            snapshot.date_last_modified,
            snapshot.archive_entries,
        );
        info!("Loaded archive with {} entries from {:?}", archive.len(), path);
        Ok(archive)
    }

    /// Write a full archive snapshot, replacing any previous one
    pub fn save_archive(&self, archive: &Archive) -> StorageResult<()> {
        let snapshot = ArchiveSnapshotOut {
            application_version: archive.application_version(),
            date_created: archive.date_created(),
            date_last_modified: archive.date_last_modified(),
            archive_entries: archive.entries().iter().map(|(k, v)| (*k, v)).collect(),
            tags: archive.all_tags(),
        };

        let path = self.config.archive_path();
        write_snapshot(&path, &snapshot)?;
        info!("Wrote archive to disk: {:?}", path);
        Ok(())
    }

    /// Load settings, or defaults if no snapshot exists
    pub fn load_settings(&self) -> StorageResult<ApplicationSettings> {
        let path = self.config.settings_path();
        match read_snapshot::<ApplicationSettings>(&path)? {
            Some(settings) => {
                info!("Loaded settings from {:?}", path);
                Ok(settings)
            }
            None => Ok(ApplicationSettings::empty()),
        }
    }

    /// Write a full settings snapshot
    pub fn save_settings(&self, settings: &ApplicationSettings) -> StorageResult<()> {
        let path = self.config.settings_path();
        write_snapshot(&path, settings)?;
        info!("Wrote settings to disk: {:?}", path);
        Ok(())
    }
}

impl ArchiveGateway for SnapshotPersistence {
    fn load_archive(&self) -> StorageResult<Archive> {
        SnapshotPersistence::load_archive(self)
    }

    fn save_archive(&self, archive: &Archive) -> StorageResult<()> {
        SnapshotPersistence::save_archive(self, archive)
    }
}

impl SettingsGateway for SnapshotPersistence {
    fn load_settings(&self) -> StorageResult<ApplicationSettings> {
        SnapshotPersistence::load_settings(self)
    }

    fn save_settings(&self, settings: &ApplicationSettings) -> StorageResult<()> {
        SnapshotPersistence::save_settings(self, settings)
    }
}

/// Read and parse a JSON snapshot; `None` if the file does not exist
fn read_snapshot<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).map_err(|e| StorageError::from_read(e, path.to_path_buf()))?;

    let value = serde_json::from_str(&content).map_err(|e| StorageError::InvalidFormat {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    Ok(Some(value))
}

fn write_snapshot<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    atomic_write(path, content.as_bytes())
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
