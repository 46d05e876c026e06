use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "infohub";
const CONFIG_FILE: &str = "config.json";

pub const ENV_DATA_DIR: &str = "INFOHUB_DATA_DIR";
pub const ENV_DATABASE: &str = "INFOHUB_DB";
pub const ENV_LOG: &str = "RUST_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the store; the platform data directory when unset.
    pub data_dir: Option<PathBuf>,
    /// Store file name inside `data_dir`, or an absolute path.
    pub database_file: String,
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: "infohub.db".to_string(),
            log_filter: "infohub=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides.
    /// Falls back to defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        let config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    fn try_load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Applies `INFOHUB_DATA_DIR`, `INFOHUB_DB` and `RUST_LOG` as read by `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(file) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database_file = file;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
        self
    }

    /// Where the store lives.
    pub fn database_path(&self) -> Result<PathBuf> {
        let file = Path::new(&self.database_file);
        if file.is_absolute() {
            return Ok(file.to_path_buf());
        }
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => directories::ProjectDirs::from("", "", APP_NAME)
                .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
                .data_dir()
                .to_path_buf(),
        };
        Ok(dir.join(file))
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_win() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/hub"),
            (ENV_DATABASE, "other.db"),
            (ENV_LOG, "infohub=debug"),
        ]
        .into_iter()
        .collect();
        let config = Config::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/hub")));
        assert_eq!(config.log_filter, "infohub=debug");
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/hub/other.db")
        );
    }

    #[test]
    fn test_empty_overrides_ignored() {
        let config = Config::default().with_overrides(|_| Some(String::new()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_absolute_database_file() {
        let config = Config {
            database_file: "/var/lib/infohub/store.db".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/var/lib/infohub/store.db")
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "log_filter": "warn" }"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.database_file, "infohub.db");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }
}
