//! Data models for docshelf
//!
//! Defines the core data structures: Tag, ArchiveEntry, and the Archive
//! aggregate that owns every entry. All mutation of entries flows through
//! the Archive so its timestamps and key invariants stay consistent.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Version written into every snapshot
pub const CURRENT_APP_VERSION: &str = "0.0.1";

/// Summary given to freshly added documents
pub const DEFAULT_SUMMARY: &str = "Not available yet";

/// A label attached to documents
///
/// Equality and hashing are by label, case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    label: String,
}

impl Tag {
    /// Create a new tag
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Get the tag label
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Self { label: s }
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self {
            label: s.to_string(),
        }
    }
}

/// Metadata for one stored document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    /// Unique identifier, assigned once
    pub id: Uuid,
    /// Display name (file name of the original)
    pub name: String,
    /// Free-text description
    pub summary: String,
    /// Final path segment of `absolute_path`
    #[serde(rename = "path")]
    pub stored_path: String,
    /// Archive-managed copy of the document
    pub absolute_path: PathBuf,
    /// Where the document was added from
    pub original_path: PathBuf,
    /// Tags for organization
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
    /// When this entry was created
    pub date_created: DateTime<Utc>,
    /// When this entry was last changed
    pub date_last_modified: DateTime<Utc>,
    /// Insertion position within the archive
    #[serde(default)]
    pub sequence: u64,
}

impl ArchiveEntry {
    /// Create an entry for a document copied to `absolute_path`
    pub fn new(
        name: impl Into<String>,
        absolute_path: impl Into<PathBuf>,
        original_path: impl Into<PathBuf>,
    ) -> Self {
        let absolute_path = absolute_path.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            summary: DEFAULT_SUMMARY.to_string(),
            stored_path: final_segment(&absolute_path),
            absolute_path,
            original_path: original_path.into(),
            tags: BTreeSet::new(),
            date_created: now,
            date_last_modified: now,
            sequence: 0,
        }
    }

    /// Update the summary
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
        self.touch();
    }

    /// Add a tag, returning whether it was newly inserted
    ///
    /// The modification time moves either way.
    pub fn add_tag(&mut self, tag: Tag) -> bool {
        let inserted = self.tags.insert(tag);
        self.touch();
        inserted
    }

    /// Check whether the entry carries a tag with this label
    pub fn has_tag(&self, label: &str) -> bool {
        self.tags.iter().any(|t| t.label() == label)
    }

    /// Bump the modification time, never before the creation time
    pub fn touch(&mut self) {
        self.date_last_modified = later_of(Utc::now(), self.date_last_modified)
            .max(self.date_created);
    }
}

/// The aggregate holding every archive entry of one tenant
#[derive(Debug, Clone)]
pub struct Archive {
    application_version: String,
    date_created: DateTime<Utc>,
    date_last_modified: DateTime<Utc>,
    entries: HashMap<Uuid, ArchiveEntry>,
    next_sequence: u64,
}

impl Archive {
    /// A fresh archive with no entries
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            application_version: CURRENT_APP_VERSION.to_string(),
            date_created: now,
            date_last_modified: now,
            entries: HashMap::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild an archive from persisted parts
    ///
    /// Entries are re-keyed by their own id. Entries without a sequence
    /// number (older snapshots) are numbered by creation time.
    pub fn from_parts(
        application_version: impl Into<String>,
        date_created: DateTime<Utc>,
        date_last_modified: DateTime<Utc>,
        entries: impl IntoIterator<Item = (Uuid, ArchiveEntry)>,
    ) -> Self {
        let mut keyed = HashMap::new();
        for (key, entry) in entries {
            if key != entry.id {
                warn!("Snapshot key {} does not match entry id {}, using entry id", key, entry.id);
            }
            keyed.insert(entry.id, entry);
        }

        let mut next_sequence = keyed.values().map(|e| e.sequence).max().unwrap_or(0) + 1;

        let mut unnumbered: Vec<_> = keyed
            .values_mut()
            .filter(|e| e.sequence == 0)
            .collect();
        unnumbered.sort_by(|a, b| (a.date_created, a.id).cmp(&(b.date_created, b.id)));
        for entry in unnumbered {
            entry.sequence = next_sequence;
            next_sequence += 1;
        }

        Self {
            application_version: application_version.into(),
            date_created,
            date_last_modified: date_last_modified.max(date_created),
            entries: keyed,
            next_sequence,
        }
    }

    pub fn application_version(&self) -> &str {
        &self.application_version
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn date_last_modified(&self) -> DateTime<Utc> {
        self.date_last_modified
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry
    pub fn entry(&self, id: Uuid) -> Option<&ArchiveEntry> {
        self.entries.get(&id)
    }

    /// Raw entry map, keyed by id
    pub fn entries(&self) -> &HashMap<Uuid, ArchiveEntry> {
        &self.entries
    }

    /// Entries in insertion order
    pub fn entries_in_order(&self) -> Vec<&ArchiveEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| (e.sequence, e.id));
        entries
    }

    /// Register an entry for a file already copied into the archive
    pub fn add_entry_from_file(
        &mut self,
        absolute_path: &Path,
        original_path: &Path,
    ) -> ArchiveEntry {
        let name = final_segment(absolute_path);
        let mut entry = ArchiveEntry::new(name, absolute_path, original_path);
        entry.sequence = self.next_sequence;
        self.next_sequence += 1;

        self.entries.insert(entry.id, entry.clone());
        self.touch();
        entry
    }

    /// Remove an entry
    pub fn remove_entry(&mut self, id: Uuid) -> Option<ArchiveEntry> {
        let removed = self.entries.remove(&id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Add a tag to an entry
    ///
    /// Returns `None` if the entry is unknown, otherwise whether the tag
    /// was newly inserted.
    pub fn add_tag(&mut self, id: Uuid, tag: Tag) -> Option<bool> {
        let inserted = self.entries.get_mut(&id)?.add_tag(tag);
        self.touch();
        Some(inserted)
    }

    /// Set the summary of an entry; returns false if the entry is unknown
    pub fn set_summary(&mut self, id: Uuid, summary: impl Into<String>) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.set_summary(summary);
        self.touch();
        true
    }

    /// Union of every entry's tags, recomputed on each call
    pub fn all_tags(&self) -> BTreeSet<Tag> {
        self.entries
            .values()
            .flat_map(|e| e.tags.iter().cloned())
            .collect()
    }

    /// Bump the archive modification time
    pub fn touch(&mut self) {
        self.date_last_modified = later_of(Utc::now(), self.date_last_modified);
    }
}

/// Equal when version, timestamps and entries match; sequence bookkeeping is ignored
impl PartialEq for Archive {
    fn eq(&self, other: &Self) -> bool {
        self.application_version == other.application_version
            && self.date_created == other.date_created
            && self.date_last_modified == other.date_last_modified
            && self.entries == other.entries
    }
}

impl Default for Archive {
    fn default() -> Self {
        Self::empty()
    }
}

/// Final segment of a path, or the whole path if it has none
fn final_segment(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Wall clocks can step backwards; timestamps must not
fn later_of(now: DateTime<Utc>, previous: DateTime<Utc>) -> DateTime<Utc> {
    now.max(previous)
}
