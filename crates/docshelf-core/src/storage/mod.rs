//! Storage layer
//!
//! Handles snapshot persistence for the archive and settings aggregates.
//!
//! ## Architecture
//!
//! - **Gateways**: `ArchiveGateway` and `SettingsGateway` are the seams the
//!   services persist through.
//! - **SnapshotPersistence**: JSON snapshot files in the tenant directory,
//!   one per aggregate.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::SnapshotPersistence;

use crate::models::Archive;
use crate::settings::ApplicationSettings;

/// Loads and saves the archive snapshot
pub trait ArchiveGateway: Send {
    /// Load the archive, or an empty one if no snapshot exists
    fn load_archive(&self) -> StorageResult<Archive>;

    /// Write a full snapshot, overwriting any previous one
    fn save_archive(&self, archive: &Archive) -> StorageResult<()>;
}

/// Loads and saves the settings snapshot
pub trait SettingsGateway: Send {
    fn load_settings(&self) -> StorageResult<ApplicationSettings>;

    fn save_settings(&self, settings: &ApplicationSettings) -> StorageResult<()>;
}
