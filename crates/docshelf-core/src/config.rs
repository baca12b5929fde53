//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/docshelf/config.toml)
//! 3. Environment variables (DOCSHELF_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! ## Layout on disk
//!
//! ```text
//! <root_dir>/
//!   <tenant_id>/
//!     archive.json     archive snapshot
//!     settings.json    settings snapshot
//!     files/           archive-managed document copies
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "DOCSHELF";

/// Tenant used when none is configured
pub const DEFAULT_TENANT: &str = "root";

/// Default number of page render workers
pub const DEFAULT_RENDER_WORKERS: usize = 4;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding every tenant
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Tenant namespace (one archive + settings pair)
    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    /// Size of the page render worker pool
    #[serde(default = "default_render_workers")]
    pub render_workers: usize,

    /// Log file path (default: {tenant_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            tenant_id: default_tenant(),
            render_workers: DEFAULT_RENDER_WORKERS,
            log_file: None,
        }
    }
}

impl Config {
    /// Build a configuration rooted at `root_dir` with default settings.
    ///
    /// No environment overrides are applied; intended for tests and embedding.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DOCSHELF_ROOT_DIR, DOCSHELF_TENANT, ...)
    /// 2. Config file (~/.config/docshelf/config.toml or DOCSHELF_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // DOCSHELF_ROOT_DIR
        if let Ok(val) = std::env::var(format!("{}_ROOT_DIR", ENV_PREFIX)) {
            self.root_dir = PathBuf::from(val);
        }

        // DOCSHELF_TENANT
        if let Ok(val) = std::env::var(format!("{}_TENANT", ENV_PREFIX)) {
            if !val.is_empty() {
                self.tenant_id = val;
            }
        }

        // DOCSHELF_RENDER_WORKERS (ignored unless it parses)
        if let Ok(val) = std::env::var(format!("{}_RENDER_WORKERS", ENV_PREFIX)) {
            if let Ok(workers) = val.trim().parse::<usize>() {
                self.render_workers = workers;
            }
        }

        // DOCSHELF_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure the tenant directory and its `files/` subdirectory exist
    pub fn ensure_tenant_dirs(&self) -> Result<()> {
        let files_dir = self.files_dir();
        if !files_dir.exists() {
            std::fs::create_dir_all(&files_dir)
                .with_context(|| format!("Failed to create tenant directory: {:?}", files_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DOCSHELF_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docshelf")
            .join("config.toml")
    }

    /// Directory of the active tenant
    pub fn tenant_dir(&self) -> PathBuf {
        self.root_dir.join(&self.tenant_id)
    }

    /// Directory holding archive-managed document copies
    pub fn files_dir(&self) -> PathBuf {
        self.tenant_dir().join("files")
    }

    /// Path to the archive snapshot
    pub fn archive_path(&self) -> PathBuf {
        self.tenant_dir().join("archive.json")
    }

    /// Path to the settings snapshot
    pub fn settings_path(&self) -> PathBuf {
        self.tenant_dir().join("settings.json")
    }

    /// Effective log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.tenant_dir().join("debug.log"))
    }

    /// Worker pool size, never below one
    pub fn effective_render_workers(&self) -> usize {
        self.render_workers.max(1)
    }
}

/// Get the default root directory
fn default_root_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docshelf")
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

fn default_render_workers() -> usize {
    DEFAULT_RENDER_WORKERS
}
