//! TOML configuration for `teamctl`.
//!
//! Resolved from `--config`, else `~/.teamchain/config.toml` if it exists,
//! else built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use teamchain_sync::SyncConfig;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Local chain store.
    pub store: StoreSection,
    /// Team server endpoint.
    pub server: ServerSection,
    /// Retry and paging bounds.
    pub sync: SyncSection,
    /// Invite link format.
    pub invite: InviteSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[store]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory of the fjall database.
    pub data_dir: PathBuf,
    /// Keep everything in memory (nothing survives the process).
    pub memory: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: default_home().join("store"),
            memory: false,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Base URL; endpoints are appended as path segments.
    pub url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: "https://api.teamchain.dev/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub retries: usize,
    pub max_pull_rounds: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            retries: defaults.retries,
            max_pull_rounds: defaults.max_pull_rounds,
        }
    }
}

/// `[invite]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InviteSection {
    /// Prefix of generated invite links, e.g. `"teamchain://"`.
    pub link_scheme: String,
}

impl Default for InviteSection {
    fn default() -> Self {
        Self {
            link_scheme: SyncConfig::default().link_scheme,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `~/.teamchain`, or `.teamchain` when there is no home directory.
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".teamchain"))
        .unwrap_or_else(|| PathBuf::from(".teamchain"))
}

impl CliConfig {
    /// Load config from a TOML file. Without a path, the default location
    /// is used when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = default_home().join("config.toml");
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            retries: self.sync.retries,
            max_pull_rounds: self.sync.max_pull_rounds,
            link_scheme: self.invite.link_scheme.clone(),
        }
    }
}
