//! Tag command handlers

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use docshelf_core::ArchiveStore;

use super::parse_entry_id;
use crate::output::Output;

/// Tag a document
pub fn add(store: &mut ArchiveStore, id: String, label: String, output: &Output) -> Result<()> {
    let label = label.trim();
    if label.is_empty() {
        bail!("Tag label cannot be empty");
    }

    let uuid = parse_entry_id(&id, store)?;
    store.add_tag(uuid, label).context("Failed to add tag")?;

    output.success(&format!("Tagged {} with '{}'", &uuid.to_string()[..8], label));
    Ok(())
}

/// List all tags with usage counts
pub fn list(store: &ArchiveStore, output: &Output) -> Result<()> {
    output.print_tags(&tag_counts(store));
    Ok(())
}

/// Every tag in use with the number of documents carrying it
fn tag_counts(store: &ArchiveStore) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = store
        .all_unique_tags()
        .into_iter()
        .map(|tag| (tag.label().to_string(), 0))
        .collect();

    for entry in store.list_all() {
        for tag in &entry.tags {
            *counts.entry(tag.label().to_string()).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Shelf;
    use crate::output::OutputFormat;

    #[test]
    fn test_tag_counts() {
        let mut shelf = Shelf::new();
        let sources = [shelf.source("a.pdf"), shelf.source("b.pdf")];
        let entries = shelf.store.add_files(&sources).unwrap();
        let output = Output::new(OutputFormat::Quiet);

        add(&mut shelf.store, entries[0].id.to_string(), "tax".into(), &output).unwrap();
        add(&mut shelf.store, entries[1].id.to_string(), "tax".into(), &output).unwrap();
        add(&mut shelf.store, entries[1].id.to_string(), " bank ".into(), &output).unwrap();

        assert_eq!(
            tag_counts(&shelf.store),
            vec![("bank".to_string(), 1), ("tax".to_string(), 2)]
        );
    }

    #[test]
    fn test_blank_label_rejected() {
        let mut shelf = Shelf::new();
        let source = shelf.source("a.pdf");
        let entry = shelf.store.add_files(&[source]).unwrap().remove(0);
        let output = Output::new(OutputFormat::Quiet);

        assert!(add(&mut shelf.store, entry.id.to_string(), "  ".into(), &output).is_err());
        assert!(shelf.store.all_unique_tags().is_empty());
    }
}
