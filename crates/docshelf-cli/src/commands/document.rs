//! Document command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use docshelf_core::ArchiveStore;

use super::{confirm, parse_entry_id};
use crate::output::Output;

/// Copy files into the archive
pub fn add(store: &mut ArchiveStore, paths: Vec<PathBuf>, output: &Output) -> Result<()> {
    if paths.is_empty() {
        bail!("No files given");
    }

    let entries = store.add_files(&paths).context("Failed to add files")?;

    if output.is_quiet() {
        for entry in &entries {
            println!("{}", entry.id);
        }
    } else {
        output.print_entries(&entries);
    }
    Ok(())
}

/// List documents, optionally only those with a tag
pub fn list(store: &ArchiveStore, tag: Option<String>, output: &Output) -> Result<()> {
    let entries = match tag {
        Some(label) => store.entries_with_tag(&label),
        None => store.list_all(),
    };
    output.print_entries(&entries);
    Ok(())
}

/// Show document details
pub fn show(store: &ArchiveStore, id: String, output: &Output) -> Result<()> {
    let uuid = parse_entry_id(&id, store)?;
    let entry = store
        .get_entry(uuid)
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", id))?;
    output.print_entry(&entry);
    Ok(())
}

/// Print the archive-managed path of a document
pub fn path(store: &ArchiveStore, id: String, output: &Output) -> Result<()> {
    let uuid = parse_entry_id(&id, store)?;
    let path = store
        .get_file_path(uuid)
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", id))?;
    output.value("path", &path.display().to_string());
    Ok(())
}

/// Replace a document's description
pub fn describe(store: &mut ArchiveStore, id: String, text: String, output: &Output) -> Result<()> {
    let uuid = parse_entry_id(&id, store)?;
    store
        .update_description(uuid, &text)
        .context("Failed to update description")?;
    output.success(&format!("Updated description of {}", &uuid.to_string()[..8]));
    Ok(())
}

/// Delete a document and its archived file
pub fn delete(store: &mut ArchiveStore, id: String, yes: bool, output: &Output) -> Result<()> {
    let uuid = parse_entry_id(&id, store)?;

    let entry = store
        .get_entry(uuid)
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", id))?;

    // Confirm deletion
    if !yes && output.should_prompt() {
        println!("Delete document: {} - {}", &entry.id.to_string()[..8], entry.name);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store
        .delete_document(uuid)
        .context("Failed to delete document")?;

    output.success(&format!("Deleted document: {}", uuid));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Shelf;
    use crate::output::OutputFormat;

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_add_and_describe() {
        let mut shelf = Shelf::new();
        let source = shelf.source("bill.pdf");

        add(&mut shelf.store, vec![source], &quiet()).unwrap();
        let entry = shelf.store.list_all().remove(0);
        describe(
            &mut shelf.store,
            entry.id.to_string()[..6].to_string(),
            "Water bill".to_string(),
            &quiet(),
        )
        .unwrap();

        assert_eq!(shelf.store.get_entry(entry.id).unwrap().summary, "Water bill");
    }

    #[test]
    fn test_add_without_files_fails() {
        let mut shelf = Shelf::new();
        assert!(add(&mut shelf.store, Vec::new(), &quiet()).is_err());
    }

    #[test]
    fn test_delete_with_yes_skips_prompt() {
        let mut shelf = Shelf::new();
        let source = shelf.source("old.pdf");
        add(&mut shelf.store, vec![source], &quiet()).unwrap();
        let entry = shelf.store.list_all().remove(0);

        let human = Output::new(OutputFormat::Human);
        delete(&mut shelf.store, entry.id.to_string(), true, &human).unwrap();

        assert!(shelf.store.list_all().is_empty());
        assert!(!shelf.config.files_dir().join("old.pdf").exists());
    }

    #[test]
    fn test_show_unknown_document() {
        let shelf = Shelf::new();
        let id = uuid::Uuid::new_v4().to_string();
        assert!(show(&shelf.store, id, &quiet()).is_err());
    }
}
