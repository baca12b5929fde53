//! Status command handler

use anyhow::Result;

use docshelf_core::{ArchiveStore, Config, PdfLoader};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &ArchiveStore, config: &Config, output: &Output) -> Result<()> {
    let entries = store.list_all();
    let tags = store.all_unique_tags();
    let total_size: u64 = entries
        .iter()
        .filter_map(|e| std::fs::metadata(&e.absolute_path).ok())
        .map(|m| m.len())
        .sum();
    let missing = entries.iter().filter(|e| !e.absolute_path.exists()).count();
    let pdf_support = PdfLoader::is_available();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "tenant": config.tenant_id,
                    "tenant_dir": config.tenant_dir(),
                    "version": store.archive().application_version(),
                    "created": store.date_created(),
                    "last_modified": store.date_last_modified(),
                    "render_workers": config.effective_render_workers(),
                    "pdf_support": pdf_support,
                    "counts": {
                        "documents": entries.len(),
                        "tags": tags.len(),
                        "missing_files": missing
                    },
                    "storage": {
                        "total_size": total_size
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", entries.len());
        }
        OutputFormat::Human => {
            println!("Docshelf Status");
            println!("===============");
            println!();
            println!("Archive:");
            println!("  Tenant:   {}", config.tenant_id);
            println!("  Location: {}", config.tenant_dir().display());
            println!("  Version:  {}", store.archive().application_version());
            println!(
                "  Created:  {}",
                store.date_created().format("%Y-%m-%d %H:%M UTC")
            );
            println!(
                "  Modified: {}",
                store.date_last_modified().format("%Y-%m-%d %H:%M UTC")
            );
            println!();
            println!("Contents:");
            println!("  Documents: {}", entries.len());
            println!("  Tags:      {}", tags.len());
            println!("  Size:      {}", human_size(total_size));
            if missing > 0 {
                println!("  Missing:   {} file(s) no longer on disk", missing);
            }
            println!();
            println!("Rendering:");
            println!("  Workers: {}", config.effective_render_workers());
            println!(
                "  PDF:     {}",
                if pdf_support {
                    "available"
                } else {
                    "unavailable (Pdfium library not found)"
                }
            );
        }
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
