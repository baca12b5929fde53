//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use docshelf_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "root_dir": config.root_dir,
                    "tenant_id": config.tenant_id,
                    "render_workers": config.render_workers,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.tenant_dir().display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  root_dir:       {}", config.root_dir.display());
            println!("  tenant_id:      {}", config.tenant_id);
            println!("  render_workers: {}", config.render_workers);
            println!(
                "  log_file:       {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "root_dir" => {
            config.root_dir = value.into();
        }
        "tenant_id" => {
            if value.is_empty() || value.contains(['/', '\\']) {
                bail!("Invalid tenant id: '{}'", value);
            }
            config.tenant_id = value.to_string();
        }
        "render_workers" => {
            let workers: usize = value
                .parse()
                .context("Invalid value for render_workers. Use a positive number.")?;
            if workers == 0 {
                bail!("render_workers must be at least 1");
            }
            config.render_workers = workers;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: root_dir, tenant_id, render_workers, log_file",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::with_root("/tmp/shelf");

        apply(&mut config, "tenant_id", "work").unwrap();
        apply(&mut config, "render_workers", "8").unwrap();
        apply(&mut config, "log_file", "/tmp/docshelf.log").unwrap();

        assert_eq!(config.tenant_id, "work");
        assert_eq!(config.render_workers, 8);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/docshelf.log")));

        apply(&mut config, "log_file", "none").unwrap();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::with_root("/tmp/shelf");

        assert!(apply(&mut config, "render_workers", "0").is_err());
        assert!(apply(&mut config, "render_workers", "many").is_err());
        assert!(apply(&mut config, "tenant_id", "../escape").is_err());
        assert!(apply(&mut config, "sync_url", "x").is_err());
    }
}
