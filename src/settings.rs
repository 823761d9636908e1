//! Optional settings file.
//!
//! Values here sit between environment variables and built-in defaults:
//! env var > settings file > default. The file is JSON, read from
//! `LIVEMSG_SETTINGS_PATH` or `./livemsg.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const SETTINGS_PATH_ENV: &str = "LIVEMSG_SETTINGS_PATH";
const DEFAULT_SETTINGS_FILE: &str = "livemsg.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub demo: DemoSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub input_timeout_secs: Option<u64>,
    /// 0 disables expiry.
    pub message_expiry_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
}

impl Settings {
    /// Path of the settings file.
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_PATH_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    /// Load settings, falling back to defaults if the file is missing or
    /// unreadable.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Invalid settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write settings as pretty JSON.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livemsg.json");
        let settings = Settings {
            engine: EngineSettings {
                input_timeout_secs: Some(30),
                message_expiry_secs: Some(0),
            },
            demo: DemoSettings {
                channel_id: Some("general".to_string()),
                user_id: None,
            },
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_partial_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{"engine":{"input_timeout_secs":5}}"#).unwrap();
        let settings = Settings::load_from(&partial);
        assert_eq!(settings.engine.input_timeout_secs, Some(5));
        assert_eq!(settings.demo, DemoSettings::default());

        let invalid = dir.path().join("invalid.json");
        std::fs::write(&invalid, "not json").unwrap();
        assert_eq!(Settings::load_from(&invalid), Settings::default());
    }
}
