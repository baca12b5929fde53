//! Theme and inbox command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use docshelf_core::SettingsService;

use crate::output::Output;

/// Show the theme, or toggle it
pub fn theme(settings: &mut SettingsService, toggle: bool, output: &Output) -> Result<()> {
    let light = if toggle {
        let light = settings
            .toggle_light_theme()
            .context("Failed to save settings")?;
        output.success(&format!("Switched to {} theme", theme_name(light)));
        light
    } else {
        settings.is_light_theme_active()
    };

    if !toggle {
        output.value("theme", theme_name(light));
    }
    Ok(())
}

/// Show the inbox folder
pub fn show_inbox(settings: &SettingsService, output: &Output) -> Result<()> {
    match settings.inbox_folder_path() {
        Some(path) => output.value("inbox", &path.display().to_string()),
        None => output.message("Inbox folder not set"),
    }
    Ok(())
}

/// Set the inbox folder; `none` or an empty value clears it
pub fn set_inbox(settings: &mut SettingsService, value: String, output: &Output) -> Result<()> {
    let path = if value.is_empty() || value == "none" {
        None
    } else {
        Some(PathBuf::from(&value))
    };
    let cleared = path.is_none();

    settings
        .set_inbox_folder_path(path)
        .context("Failed to save settings")?;

    if cleared {
        output.success("Cleared inbox folder");
    } else {
        output.success(&format!("Set inbox folder to {}", value));
    }
    Ok(())
}

fn theme_name(light: bool) -> &'static str {
    if light {
        "light"
    } else {
        "dark"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use docshelf_core::{Config, EventBus, SnapshotPersistence};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open(temp_dir: &TempDir) -> SettingsService {
        let config = Config::with_root(temp_dir.path());
        SettingsService::open(
            Box::new(SnapshotPersistence::new(config)),
            Arc::new(EventBus::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_theme_toggle_persists() {
        let temp_dir = TempDir::new().unwrap();
        let output = Output::new(OutputFormat::Quiet);

        theme(&mut open(&temp_dir), true, &output).unwrap();

        assert!(open(&temp_dir).is_light_theme_active());
    }

    #[test]
    fn test_set_and_clear_inbox() {
        let temp_dir = TempDir::new().unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set_inbox(&mut open(&temp_dir), "/home/me/Inbox".into(), &output).unwrap();
        assert_eq!(
            open(&temp_dir).inbox_folder_path(),
            Some(std::path::Path::new("/home/me/Inbox"))
        );

        set_inbox(&mut open(&temp_dir), "none".into(), &output).unwrap();
        assert!(open(&temp_dir).inbox_folder_path().is_none());
    }
}
