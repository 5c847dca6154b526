//! Configuration management
//!
//! Where the records database lives, which users are barred from the
//! directory, and the default log level.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding every ledger. Defaults to `records.db` in the data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Emails removed from the user directory whenever it is loaded
    #[serde(default = "default_blocked_emails")]
    pub blocked_emails: Vec<String>,
}

fn default_blocked_emails() -> Vec<String> {
    vec!["sam@student.com".to_string()]
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            blocked_emails: default_blocked_emails(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is not set
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("Config path has no parent")?;

        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Configured database path, or `records.db` in the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("records.db")),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "course-engine", "course-engine")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.identity.blocked_emails, vec!["sam@student.com"]);
        assert!(path.exists());
    }

    #[test]
    fn test_identity_section_without_list_blocks_sam() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[identity]\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.identity.blocked_emails, vec!["sam@student.com"]);

        std::fs::write(&path, "[identity]\nblocked_emails = []\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert!(config.identity.blocked_emails.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[identity]\nblocked_emails = [\"sam@student.com\"]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.identity.blocked_emails, vec!["sam@student.com"]);
        assert!(config.storage.database_path.is_none());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/tmp/records.db"));
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/records.db")
        );

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
