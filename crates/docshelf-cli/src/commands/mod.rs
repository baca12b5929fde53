//! Command handlers

pub mod config;
pub mod document;
pub mod render;
pub mod settings;
pub mod status;
pub mod tag;

use std::io::{self, Write};

use anyhow::{bail, Result};
use uuid::Uuid;

use docshelf_core::ArchiveStore;

/// Parse a document ID (supports full UUID or prefix)
pub fn parse_entry_id(id: &str, store: &ArchiveStore) -> Result<Uuid> {
    // Try full UUID first
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    if id.is_empty() {
        bail!("Document ID cannot be empty");
    }

    // Try prefix match
    let entries = store.list_all();
    let matches: Vec<_> = entries
        .iter()
        .filter(|e| e.id.to_string().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No document found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple documents match '{}':", id);
            for entry in &matches {
                eprintln!("  {} - {}", entry.id, entry.name);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Prompt user for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::Arc;

    use docshelf_core::{ArchiveStore, Config, EventBus};
    use tempfile::TempDir;

    /// A store in a temp dir plus a folder of source files
    pub struct Shelf {
        pub temp_dir: TempDir,
        pub config: Config,
        pub store: ArchiveStore,
    }

    impl Shelf {
        pub fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let config = Config::with_root(temp_dir.path().join("shelf"));
            config.ensure_tenant_dirs().unwrap();
            let store = ArchiveStore::open(&config, Arc::new(EventBus::new())).unwrap();
            Self {
                temp_dir,
                config,
                store,
            }
        }

        pub fn source(&self, name: &str) -> PathBuf {
            let dir = self.temp_dir.path().join("incoming");
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join(name);
            std::fs::write(&path, name).unwrap();
            path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Shelf;
    use super::*;

    #[test]
    fn test_parse_full_uuid() {
        let shelf = Shelf::new();
        let id = Uuid::new_v4();
        assert_eq!(parse_entry_id(&id.to_string(), &shelf.store).unwrap(), id);
    }

    #[test]
    fn test_parse_unique_prefix() {
        let mut shelf = Shelf::new();
        let source = shelf.source("a.pdf");
        let entry = shelf.store.add_files(&[source]).unwrap().remove(0);

        let prefix = &entry.id.to_string()[..8];
        assert_eq!(parse_entry_id(prefix, &shelf.store).unwrap(), entry.id);
    }

    #[test]
    fn test_parse_unknown_prefix() {
        let shelf = Shelf::new();
        assert!(parse_entry_id("zzzz", &shelf.store).is_err());
        assert!(parse_entry_id("", &shelf.store).is_err());
    }
}
