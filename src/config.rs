//! Layered settings: built-in defaults, then `studio.toml` in the data directory, then `STUDIO_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional configuration file inside the data directory.
pub const CONFIG_FILE: &str = "studio.toml";

const ENV_PREFIX: &str = "STUDIO";

/// Runtime configuration for the `studio` binary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StudioConfig {
    /// Directory holding the database, the catalog cache and `studio.toml`
    pub data_dir: PathBuf,
    /// Database file name, relative to `data_dir` unless absolute
    pub database_file: String,
    /// Catalog cache file name, relative to `data_dir` unless absolute
    pub catalog_cache_file: String,
    /// Log filter used when RUST_LOG is not set
    pub log_level: String,
    /// Formula suggested for new projects
    pub default_formula: Option<String>,
}

impl StudioConfig {
    fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            database_file: "studio.json".to_string(),
            catalog_cache_file: "workflow_cache.json".to_string(),
            log_level: "warn".to_string(),
            default_formula: None,
        }
    }

    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. `studio.toml` in the data directory
    /// 3. Environment variables (prefixed with STUDIO_)
    ///
    /// An explicit `data_dir` (the `--data-dir` flag) beats all three.
    pub fn load(data_dir: Option<&Path>) -> Result<Self> {
        Self::load_with_env(data_dir, None)
    }

    fn load_with_env(data_dir: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let dir = data_dir.map(Path::to_path_buf).unwrap_or_else(default_data_dir);
        let defaults = Self::with_data_dir(dir.clone());

        let mut builder = Config::builder()
            .set_default("data_dir", dir.to_string_lossy().to_string())?
            .set_default("database_file", defaults.database_file)?
            .set_default("catalog_cache_file", defaults.catalog_cache_file)?
            .set_default("log_level", defaults.log_level)?;

        let file = dir.join(CONFIG_FILE);
        if file.exists() {
            builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(env));

        let config = builder.build().context("Failed to read configuration")?;
        let mut studio: StudioConfig = config.try_deserialize().context("Invalid configuration")?;

        if let Some(dir) = data_dir {
            studio.data_dir = dir.to_path_buf();
        }
        Ok(studio)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn catalog_cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalog_cache_file)
    }
}

/// `$STUDIO_DATA_DIR`, else `~/.studio`.
fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STUDIO_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".studio")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StudioConfig::load_with_env(Some(dir.path()), Some(Map::new())).unwrap();
        assert_eq!(cfg, StudioConfig::with_data_dir(dir.path().to_path_buf()));
        assert_eq!(cfg.database_path(), dir.path().join("studio.json"));
        assert_eq!(cfg.catalog_cache_path(), dir.path().join("workflow_cache.json"));
    }

    #[test]
    fn test_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "database_file = \"weddings-2025.json\"\nlog_level = \"info\"\ndefault_formula = \"Photo only\"\n",
        )
        .unwrap();

        let mut env = Map::new();
        env.insert("STUDIO_LOG_LEVEL".to_string(), "debug".to_string());
        let cfg = StudioConfig::load_with_env(Some(dir.path()), Some(env)).unwrap();

        assert_eq!(cfg.database_path(), dir.path().join("weddings-2025.json"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.default_formula.as_deref(), Some("Photo only"));
    }

    #[test]
    fn test_explicit_data_dir_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "data_dir = \"/somewhere/else\"\n").unwrap();
        let cfg = StudioConfig::load_with_env(Some(dir.path()), Some(Map::new())).unwrap();
        assert_eq!(cfg.data_dir, dir.path());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "log_level = [").unwrap();
        assert!(StudioConfig::load_with_env(Some(dir.path()), Some(Map::new())).is_err());
    }
}
