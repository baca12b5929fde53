//! Archive store
//!
//! The `ArchiveStore` is the single owner of the `Archive`. Every command
//! follows the same shape:
//!
//! 1. validate (unknown ids fail before anything happens)
//! 2. mutate the archive
//! 3. publish entity events, then `AllTagsChanged` when tags may have moved
//! 4. persist the snapshot
//! 5. publish `ArchiveModified`
//!
//! Commands take `&mut self`, so the borrow checker serializes them. A
//! front end that issues commands from several threads wraps the store in
//! a `Mutex`; events are delivered synchronously on the calling thread.
//!
//! ## Usage
//!
//! ```text
//! let events = Arc::new(EventBus::new());
//! let mut store = ArchiveStore::open(&config, Arc::clone(&events))?;
//!
//! let added = store.add_files(&["/home/me/scan.pdf"])?;
//! store.add_tag(added[0].id, "invoice")?;
//! ```

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::events::{ArchiveEvent, EventBus};
use crate::models::{Archive, ArchiveEntry, Tag};
use crate::storage::{ArchiveGateway, SnapshotPersistence, StorageError};

/// Errors returned by archive store commands
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No entry with this id
    #[error("Document not found: {id}")]
    NotFound { id: Uuid },

    /// A source file could not be copied into the archive
    #[error("Failed to add '{path}': {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A source path is not a regular file
    #[error("Cannot add '{path}': not a regular file")]
    InvalidSource { path: PathBuf },

    /// Snapshot could not be read or written
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ArchiveError {
    /// The source file that failed, for add-files errors
    pub fn failed_path(&self) -> Option<&Path> {
        match self {
            ArchiveError::Copy { path, .. } | ArchiveError::InvalidSource { path } => Some(path),
            _ => None,
        }
    }

    /// What the user can do about a storage failure
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ArchiveError::Storage(e) => e.recovery_suggestion(),
            _ => None,
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Command interface over the archive aggregate
pub struct ArchiveStore {
    archive: Archive,
    gateway: Box<dyn ArchiveGateway>,
    files_dir: PathBuf,
    events: Arc<EventBus>,
}

impl ArchiveStore {
    /// Open the store for the configured tenant
    ///
    /// Loads the archive snapshot, or starts empty if there is none.
    pub fn open(config: &Config, events: Arc<EventBus>) -> ArchiveResult<Self> {
        let persistence = SnapshotPersistence::new(config.clone());
        Self::with_gateway(Box::new(persistence), config.files_dir(), events)
    }

    /// Open the store with an explicit gateway and file directory
    pub fn with_gateway(
        gateway: Box<dyn ArchiveGateway>,
        files_dir: PathBuf,
        events: Arc<EventBus>,
    ) -> ArchiveResult<Self> {
        let archive = gateway.load_archive()?;
        Ok(Self {
            archive,
            gateway,
            files_dir,
            events,
        })
    }

    /// Read access to the aggregate
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// The bus this store publishes on
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Directory holding archive-managed copies
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    // ==================== Commands ====================

    /// Copy files into the archive and create an entry for each
    ///
    /// Entries are returned in input order. If any copy fails, copies
    /// already made by this call are removed and the archive is left
    /// unchanged; the error names the file that failed.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> ArchiveResult<Vec<ArchiveEntry>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut copies: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(paths.len());
        for path in paths {
            match self.copy_into_archive(path.as_ref()) {
                Ok(copy) => copies.push(copy),
                Err(e) => {
                    warn!("Adding files aborted: {}", e);
                    remove_copies(&copies);
                    return Err(e);
                }
            }
        }

        let entries: Vec<ArchiveEntry> = copies
            .iter()
            .map(|(copy, original)| self.archive.add_entry_from_file(copy, original))
            .collect();

        for entry in &entries {
            self.events.publish(ArchiveEvent::EntryAdded(entry.clone()));
        }
        self.persist()?;
        Ok(entries)
    }

    /// Add a tag to a document
    ///
    /// Adding a tag the document already has changes nothing in the set,
    /// but the events and save happen all the same.
    pub fn add_tag(&mut self, id: Uuid, label: &str) -> ArchiveResult<()> {
        let tag = Tag::new(label);
        self.archive
            .add_tag(id, tag.clone())
            .ok_or(ArchiveError::NotFound { id })?;

        self.events.publish(ArchiveEvent::TagAdded { tag, id });
        self.events
            .publish(ArchiveEvent::AllTagsChanged(self.all_unique_tags()));
        self.persist()
    }

    /// Replace a document's description
    pub fn update_description(&mut self, id: Uuid, text: &str) -> ArchiveResult<()> {
        if !self.archive.set_summary(id, text) {
            return Err(ArchiveError::NotFound { id });
        }

        self.events.publish(ArchiveEvent::DescriptionChanged {
            id,
            text: text.to_string(),
        });
        self.persist()
    }

    /// Delete a document and its archive-managed file
    ///
    /// Unknown ids are logged and ignored. Failing to remove the file is
    /// logged; the entry is removed regardless.
    pub fn delete_document(&mut self, id: Uuid) -> ArchiveResult<()> {
        let Some(entry) = self.archive.remove_entry(id) else {
            warn!("Document with id {} not found", id);
            return Ok(());
        };

        remove_backing_file(&entry);

        self.events.publish(ArchiveEvent::DocumentDeleted(id));
        self.events
            .publish(ArchiveEvent::AllTagsChanged(self.all_unique_tags()));
        self.persist()
    }

    // ==================== Queries ====================

    /// Snapshot of every entry, in insertion order
    pub fn list_all(&self) -> Vec<ArchiveEntry> {
        self.archive
            .entries_in_order()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Get an entry by id
    pub fn get_entry(&self, id: Uuid) -> Option<ArchiveEntry> {
        self.archive.entry(id).cloned()
    }

    /// Archive-managed path of a document
    pub fn get_file_path(&self, id: Uuid) -> Option<PathBuf> {
        self.archive.entry(id).map(|e| e.absolute_path.clone())
    }

    /// Union of every entry's tags
    pub fn all_unique_tags(&self) -> BTreeSet<Tag> {
        self.archive.all_tags()
    }

    /// Entries carrying a tag, in insertion order
    pub fn entries_with_tag(&self, label: &str) -> Vec<ArchiveEntry> {
        self.archive
            .entries_in_order()
            .into_iter()
            .filter(|e| e.has_tag(label))
            .cloned()
            .collect()
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.archive.date_created()
    }

    pub fn date_last_modified(&self) -> DateTime<Utc> {
        self.archive.date_last_modified()
    }

    // ==================== Lifecycle ====================

    /// Final save before exit; failures are logged, not returned
    pub fn shutdown(self) {
        match self.gateway.save_archive(&self.archive) {
            Ok(()) => info!("Archive saved on shutdown"),
            Err(e) => warn!("Failed to save archive on shutdown: {}", e),
        }
    }

    fn persist(&mut self) -> ArchiveResult<()> {
        self.gateway.save_archive(&self.archive)?;
        self.events.publish(ArchiveEvent::ArchiveModified(
            self.archive.date_last_modified(),
        ));
        Ok(())
    }

    /// Copy one file into `files_dir`, returning (copy, original) paths
    ///
    /// Never overwrites an existing file in the archive.
    fn copy_into_archive(&self, source: &Path) -> ArchiveResult<(PathBuf, PathBuf)> {
        let copy_err = |e: io::Error| ArchiveError::Copy {
            path: source.to_path_buf(),
            source: e,
        };

        let metadata = fs::metadata(source).map_err(copy_err)?;
        let file_name = match source.file_name() {
            Some(name) if metadata.is_file() => name,
            _ => {
                return Err(ArchiveError::InvalidSource {
                    path: source.to_path_buf(),
                })
            }
        };
        let original = fs::canonicalize(source).map_err(copy_err)?;

        fs::create_dir_all(&self.files_dir).map_err(copy_err)?;
        let target = self.files_dir.join(file_name);

        let mut reader = File::open(source).map_err(copy_err)?;
        let mut writer = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(copy_err)?;

        if let Err(e) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
            drop(writer);
            let _ = fs::remove_file(&target);
            return Err(copy_err(e));
        }

        info!(
            "Created copy of file '{}' at: {:?}",
            file_name.to_string_lossy(),
            target
        );
        Ok((target, original))
    }
}

/// Undo copies made by an aborted add
fn remove_copies(copies: &[(PathBuf, PathBuf)]) {
    for (copy, _) in copies {
        match fs::remove_file(copy) {
            Ok(()) => info!("Rolled back copy {:?}", copy),
            Err(e) => warn!("Failed to roll back copy {:?}: {}", copy, e),
        }
    }
}

fn remove_backing_file(entry: &ArchiveEntry) {
    let path = &entry.absolute_path;
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => info!("Deleted file: {:?}", path),
        Err(e) => warn!("Failed to delete file for document {}: {}", entry.id, e),
    }
}
