use anyhow::{Context, Result};
use queue::PollerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_INTERVAL_MS: u64 = 100;

/// User settings, stored as JSON next to the rest of the app data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub poll_interval_ms: u64,
    pub error_ttl_ms: u64,
    /// Rescan period for `watch`.
    pub refresh_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 2000,
            error_ttl_ms: 3000,
            refresh_interval_ms: 2000,
            database_path: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        store::app_data_dir().join("settings.json")
    }

    /// Missing file means defaults; a broken one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| store::app_data_dir().join("handles.db"))
    }

    pub fn state_path(&self) -> PathBuf {
        store::app_data_dir().join("state.json")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(MIN_INTERVAL_MS)),
            error_ttl: Duration::from_millis(self.error_ttl_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(&tmp.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poller_config().poll_interval, Duration::from_secs(2));
        assert_eq!(settings.poller_config().error_ttl, Duration::from_secs(3));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"api_base_url":"http://render-box:9000","poll_interval_ms":5000}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.api_base_url, "http://render-box:9000");
        assert_eq!(settings.poll_interval_ms, 5000);
        assert_eq!(settings.error_ttl_ms, 3000);
    }

    #[test]
    fn broken_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let settings = Settings {
            database_path: Some(tmp.path().join("db.sqlite")),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
        assert_eq!(settings.database_path(), tmp.path().join("db.sqlite"));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let settings = Settings {
            poll_interval_ms: 0,
            refresh_interval_ms: 0,
            ..Settings::default()
        };
        assert_eq!(settings.poller_config().poll_interval, Duration::from_millis(100));
        assert_eq!(settings.refresh_interval(), Duration::from_millis(100));
    }
}
