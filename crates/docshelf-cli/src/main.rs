//! Docshelf CLI
//!
//! Command-line interface for Docshelf - personal document archive.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docshelf_core::{ArchiveStore, Config, EventBus, SettingsService, SnapshotPersistence};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "docshelf")]
#[command(about = "Docshelf - Personal document archive")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files into the archive
    Add {
        /// Files to add
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List documents
    #[command(alias = "ls")]
    List {
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Show document details
    Show {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Print the archived file path of a document
    Path {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Add a tag to a document
    Tag {
        /// Document ID (full UUID or prefix)
        id: String,
        /// Tag label
        label: String,
    },
    /// Set the description of a document
    Describe {
        /// Document ID (full UUID or prefix)
        id: String,
        /// New description
        text: String,
    },
    /// Delete a document and its archived file
    #[command(alias = "rm")]
    Delete {
        /// Document ID (full UUID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List all tags
    Tags,
    /// Render every page of a document to PNG files
    Render {
        /// Document ID (full UUID or prefix)
        id: String,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Show archive status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show or toggle the theme
    Theme {
        #[command(subcommand)]
        command: Option<ThemeCommands>,
    },
    /// Show or set the inbox folder
    Inbox {
        #[command(subcommand)]
        command: Option<InboxCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (root_dir, tenant_id, render_workers, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand, Clone)]
enum ThemeCommands {
    /// Show the active theme
    Show,
    /// Switch between light and dark
    Toggle,
}

#[derive(Subcommand, Clone)]
enum InboxCommands {
    /// Show the inbox folder
    Show,
    /// Set the inbox folder ("none" clears it)
    Set {
        /// Folder path
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without an archive
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config =
        Config::load_with_cli_override(cli.config.as_ref()).context("Failed to load configuration")?;
    config
        .ensure_tenant_dirs()
        .context("Failed to create archive directories")?;
    init_logging(&config);

    let events = Arc::new(EventBus::new());

    match cli.command {
        Commands::Theme { command } => {
            let mut settings = open_settings(&config, events)?;
            let toggle = matches!(command, Some(ThemeCommands::Toggle));
            let result = commands::settings::theme(&mut settings, toggle, &output);
            settings.shutdown();
            result
        }
        Commands::Inbox { command } => {
            let mut settings = open_settings(&config, events)?;
            let result = match command {
                Some(InboxCommands::Show) | None => {
                    commands::settings::show_inbox(&settings, &output)
                }
                Some(InboxCommands::Set { path }) => {
                    commands::settings::set_inbox(&mut settings, path, &output)
                }
            };
            settings.shutdown();
            result
        }
        command => {
            let mut store = ArchiveStore::open(&config, events).map_err(|e| {
                let context = open_context("archive", e.recovery_suggestion());
                anyhow::Error::new(e).context(context)
            })?;
            let result = handle_archive_command(command, &mut store, &config, &output).await;
            store.shutdown();
            result
        }
    }
}

async fn handle_archive_command(
    command: Commands,
    store: &mut ArchiveStore,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        Commands::Add { paths } => commands::document::add(store, paths, output),
        Commands::List { tag } => commands::document::list(store, tag, output),
        Commands::Show { id } => commands::document::show(store, id, output),
        Commands::Path { id } => commands::document::path(store, id, output),
        Commands::Tag { id, label } => commands::tag::add(store, id, label, output),
        Commands::Describe { id, text } => commands::document::describe(store, id, text, output),
        Commands::Delete { id, yes } => commands::document::delete(store, id, yes, output),
        Commands::Tags => commands::tag::list(store, output),
        Commands::Render { id, out } => {
            commands::render::render(store, config, id, out, output).await
        }
        Commands::Status => commands::status::show(store, config, output),
        Commands::Config { .. } | Commands::Theme { .. } | Commands::Inbox { .. } => {
            unreachable!("handled in main")
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

fn open_settings(config: &Config, events: Arc<EventBus>) -> Result<SettingsService> {
    SettingsService::open(Box::new(SnapshotPersistence::new(config.clone())), events).map_err(|e| {
        let context = open_context("settings", e.recovery_suggestion());
        anyhow::Error::new(e).context(context)
    })
}

/// Error context for a failed open, with the storage hint when there is one
fn open_context(what: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(hint) => format!("Failed to open {}. {}", what, hint),
        None => format!("Failed to open {}", what),
    }
}

/// Initialize file logging when DOCSHELF_LOG is set
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("DOCSHELF_LOG") else {
        return;
    };

    let log_path = config.log_path();
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "docshelf_core={},docshelf={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
