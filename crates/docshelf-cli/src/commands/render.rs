//! Render command handler
//!
//! Renders every page of a document through the render scheduler and
//! writes each page as a PNG.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use docshelf_core::{
    ArchiveStore, Config, DirectDispatcher, FormatLoader, PageReady, RenderScheduler,
    RenderSettings, ViewState,
};

use super::parse_entry_id;
use crate::output::{print_json, Output, OutputFormat};

const RENDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Render a document's pages into `out`
pub async fn render(
    store: &ArchiveStore,
    config: &Config,
    id: String,
    out: PathBuf,
    output: &Output,
) -> Result<()> {
    let uuid = parse_entry_id(&id, store)?;
    let entry = store
        .get_entry(uuid)
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", id))?;

    std::fs::create_dir_all(&out)
        .with_context(|| format!("Failed to create output directory {:?}", out))?;

    let scheduler = RenderScheduler::new(
        Handle::current(),
        Arc::new(FormatLoader::new()),
        Arc::new(DirectDispatcher),
        RenderSettings::default(),
        config.effective_render_workers(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<PageReady>();
    let ticket = scheduler
        .view_document(&entry.absolute_path, move |page| {
            let _ = tx.send(page);
        })
        .with_context(|| format!("Failed to open {}", entry.name))?;

    tokio::time::timeout(RENDER_TIMEOUT, async {
        while !matches!(scheduler.state(), ViewState::Ready { .. }) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .context("Timed out rendering pages")?;
    scheduler.clear();

    let stem = file_stem(&entry.name);
    let mut written = Vec::new();
    while let Ok(page) = rx.try_recv() {
        let target = out.join(page_file_name(&stem, page.page_index, ticket.page_count));
        page.image
            .save(&target)
            .with_context(|| format!("Failed to write {:?}", target))?;
        written.push((page.page_index, target));
    }
    written.sort();

    let missing = ticket.page_count - written.len();
    match output.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "id": entry.id,
            "pages": ticket.page_count,
            "written": written.iter().map(|(_, p)| p).collect::<Vec<_>>(),
            "failed": missing,
        })),
        OutputFormat::Quiet => {
            for (_, path) in &written {
                println!("{}", path.display());
            }
        }
        OutputFormat::Human => {
            for (_, path) in &written {
                println!("{}", path.display());
            }
            println!(
                "\nRendered {} of {} page(s) at {} dpi",
                written.len(),
                ticket.page_count,
                RenderSettings::default().dpi()
            );
            if missing > 0 {
                println!("{} page(s) failed to render; see the log for details", missing);
            }
        }
    }

    Ok(())
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// `<stem>-page-<n>.png`, numbered from 1 and zero-padded to the page count
fn page_file_name(stem: &str, index: usize, page_count: usize) -> String {
    let width = page_count.to_string().len();
    format!("{}-page-{:0width$}.png", stem, index + 1, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Shelf;
    use image::{ImageBuffer, Rgba, RgbaImage};

    #[test]
    fn test_page_file_name() {
        assert_eq!(page_file_name("scan", 0, 1), "scan-page-1.png");
        assert_eq!(page_file_name("scan", 8, 12), "scan-page-09.png");
        assert_eq!(file_stem("report.final.png"), "report.final");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_writes_pngs() {
        let mut shelf = Shelf::new();
        let source = shelf.temp_dir.path().join("receipt.png");
        let buffer: RgbaImage = ImageBuffer::from_pixel(5, 7, Rgba([1, 2, 3, 255]));
        buffer.save(&source).unwrap();
        let entry = shelf.store.add_files(&[source]).unwrap().remove(0);
        let out = shelf.temp_dir.path().join("out");

        render(
            &shelf.store,
            &shelf.config,
            entry.id.to_string(),
            out.clone(),
            &Output::new(OutputFormat::Quiet),
        )
        .await
        .unwrap();

        let page = image::open(out.join("receipt-page-1.png")).unwrap();
        assert_eq!((page.width(), page.height()), (10, 14));
    }
}
