//! Configuration file management for larder.
//!
//! Provides a TOML-based config file at `~/.config/larder/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use larder_db::config::DbConfig;

/// Environment variable naming the operator recorded on ledger entries.
pub const ACTOR_ENV: &str = "LARDER_ACTOR";

/// Actor recorded when nothing else is configured.
pub const DEFAULT_ACTOR: &str = "operator";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub operator: OperatorSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
    /// Connection pool size (default 5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OperatorSection {
    /// Name written to the `actor` column of every movement.
    pub name: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the larder config directory: `$XDG_CONFIG_HOME/larder` or
/// `~/.config/larder`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("larder");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("larder")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file is made owner-only on Unix since it carries the database URL.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct LarderConfig {
    pub db_config: DbConfig,
    pub actor: String,
}

impl LarderConfig {
    /// Resolve configuration from the CLI flags, the environment and the
    /// config file at [`config_path`].
    ///
    /// - DB URL: `cli_db_url` > `LARDER_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Actor: `cli_actor` > `LARDER_ACTOR` > `operator.name` > `operator`
    /// - Pool size: `database.max_connections` > 5
    pub fn resolve(cli_db_url: Option<&str>, cli_actor: Option<&str>) -> Result<Self> {
        let path = config_path();
        let file_config = if path.exists() {
            Some(load_config_from(&path)?)
        } else {
            None
        };
        Ok(Self::from_sources(cli_db_url, cli_actor, file_config.as_ref()))
    }

    fn from_sources(
        cli_db_url: Option<&str>,
        cli_actor: Option<&str>,
        file_config: Option<&ConfigFile>,
    ) -> Self {
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::URL_ENV) {
            url
        } else if let Some(cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let actor = cli_actor
            .map(str::to_string)
            .or_else(|| std::env::var(ACTOR_ENV).ok())
            .or_else(|| file_config.and_then(|c| c.operator.name.clone()))
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

        let mut db_config = DbConfig::new(db_url);
        if let Some(max) = file_config.and_then(|c| c.database.max_connections) {
            db_config = db_config.with_max_connections(max);
        }

        Self { db_config, actor }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
