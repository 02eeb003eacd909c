//! Report settings
//!
//! Optional JSON file with the run's paths and rendering choices. Every field
//! has a default, so an absent file (or an empty `{}`) gives the stock
//! behaviour: read `input/input.xml`, write `output/index.html`.

use crate::aggregate::{AggregateOptions, DEFAULT_COUNTRY_PREFIX};
use crate::error::{ReportError, Result};
use crate::locale::LocaleTable;
use crate::render::{RenderOptions, DEFAULT_SELF_LABEL, DEFAULT_TITLE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Stripped from the front of every address (default: "+39")
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,
    #[serde(default = "default_title")]
    pub title: String,
    /// Sender label for outgoing messages (default: "Me")
    #[serde(default = "default_self_label")]
    pub self_label: String,
    #[serde(default = "default_true")]
    pub escape_bodies: bool,
    #[serde(default)]
    pub strict_dates: bool,
}

fn default_input_path() -> PathBuf {
    Path::new("input").join("input.xml")
}

fn default_output_path() -> PathBuf {
    Path::new("output").join("index.html")
}

fn default_country_prefix() -> String {
    DEFAULT_COUNTRY_PREFIX.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_self_label() -> String {
    DEFAULT_SELF_LABEL.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_path: default_output_path(),
            country_prefix: default_country_prefix(),
            title: default_title(),
            self_label: default_self_label(),
            escape_bodies: true,
            strict_dates: false,
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }

        let invalid = |message: String| ReportError::Settings {
            path: path.to_path_buf(),
            message,
        };

        let content = fs::read_to_string(path)
            .map_err(|e| invalid(format!("failed to read: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| invalid(format!("failed to parse: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| ReportError::Settings {
            path: path.to_path_buf(),
            message,
        };

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| invalid(format!("failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| invalid(format!("failed to create directory: {}", e)))?;
        }

        fs::write(path, content).map_err(|e| invalid(format!("failed to write: {}", e)))
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            country_prefix: self.country_prefix.clone(),
            locale: LocaleTable::italian(),
            strict_dates: self.strict_dates,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            title: self.title.clone(),
            escape_bodies: self.escape_bodies,
            self_label: self.self_label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.input_path, Path::new("input").join("input.xml"));
        assert_eq!(settings.output_path, Path::new("output").join("index.html"));
        assert!(settings.escape_bodies);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "country_prefix": "+41", "escape_bodies": false }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.country_prefix, "+41");
        assert!(!settings.escape_bodies);
        assert_eq!(settings.title, "Message Threads");
        assert_eq!(settings.aggregate_options().country_prefix, "+41");
        assert!(!settings.render_options().escape_bodies);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::load(&path), Err(ReportError::Settings { .. })));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("settings.json");
        let settings = Settings {
            title: "Archivio SMS".to_string(),
            strict_dates: true,
            ..Default::default()
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }
}
