//! Configuration file and data locations.
//!
//! Everything lives below the TaskBuddy home directory: `--home`, else
//! `$TASKBUDDY_HOME`, else `~/.taskbuddy`. `config.toml` in that directory is
//! optional; missing keys take their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const HOME_ENV: &str = "TASKBUDDY_HOME";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Document store file. Defaults to `<home>/db.json`.
    pub db_path: Option<PathBuf>,
    /// Attachment root. Defaults to `<home>/blobs`.
    pub blob_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// How often the store file is checked for writes from other processes.
    pub poll_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig { poll_interval_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `TB_LOG` is unset.
    pub level: String,
    /// Defaults to `<home>/tb.log`.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".into(), file: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub toast_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig { toast_ms: 1000 }
    }
}

/// Resolve the home directory from the flag, the environment, or `$HOME`.
pub fn home_dir(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = flag {
        return Ok(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os(HOME_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".taskbuddy"))
        .context("Could not determine home directory, set TASKBUDDY_HOME")
}

/// Loaded configuration together with the home it was read from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: PathBuf,
    pub config: Config,
}

impl Settings {
    pub fn load(home: PathBuf) -> Result<Settings> {
        let file = home.join(CONFIG_FILE);
        let config = if file.exists() {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read config file: {}", file.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", file.display()))?
        } else {
            Config::default()
        };
        Ok(Settings { home, config })
    }

    fn under_home(&self, configured: &Option<PathBuf>, default: &str) -> PathBuf {
        match configured {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.home.join(p),
            None => self.home.join(default),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.under_home(&self.config.storage.db_path, "db.json")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.under_home(&self.config.storage.blob_dir, "blobs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.under_home(&self.config.log.file, "tb.log")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.feed.poll_interval_ms.max(50))
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.config.ui.toast_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(settings.config, Config::default());
        assert_eq!(settings.db_path(), dir.path().join("db.json"));
        assert_eq!(settings.toast_duration(), Duration::from_millis(1000));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[storage]\ndb_path = \"data/tasks.json\"\n\n[ui]\ntoast_ms = 2500\n",
        )
        .unwrap();
        let settings = Settings::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(settings.db_path(), dir.path().join("data/tasks.json"));
        assert_eq!(settings.blob_dir(), dir.path().join("blobs"));
        assert_eq!(settings.config.ui.toast_ms, 2500);
        assert_eq!(settings.config.feed.poll_interval_ms, 500);
        assert_eq!(settings.config.log.level, "info");
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[ui\n").unwrap();
        assert!(Settings::load(dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn flag_beats_environment() {
        let flag = PathBuf::from("/tmp/tb-flag");
        assert_eq!(home_dir(Some(&flag)).unwrap(), flag);
    }
}
