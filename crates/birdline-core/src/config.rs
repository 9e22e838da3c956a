//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the Airtable base id, table names, the default status filter and the
//! concurrent-accept guard.
//!
//! Configuration is stored at `~/.config/birdline/config.json`. The
//! `AIRTABLE_BASE_ID` environment variable overrides the stored base id, and
//! `AIRTABLE_ACCESS_TOKEN` supplies the token (falling back to the keychain).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::CredentialStore;
use crate::directory::StatusFilter;
use crate::models::RescueStatus;
use crate::workflow::TransitionGuard;

/// Application name used for config/log directory paths
const APP_NAME: &str = "birdline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_RESCUE_TABLE: &str = "Bird Alerts";
pub const DEFAULT_VOLUNTEER_TABLE: &str = "Rescue and Transport Team";

pub const ENV_BASE_ID: &str = "AIRTABLE_BASE_ID";
pub const ENV_ACCESS_TOKEN: &str = "AIRTABLE_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_id: Option<String>,
    pub rescue_table: String,
    pub volunteer_table: String,
    /// Statuses shown when the directory opens; `None` uses the built-in default.
    pub default_statuses: Option<Vec<RescueStatus>>,
    /// Re-read a rescue before writing and refuse if someone else moved it.
    pub guard_concurrent_accept: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_id: None,
            rescue_table: DEFAULT_RESCUE_TABLE.to_string(),
            volunteer_table: DEFAULT_VOLUNTEER_TABLE.to_string(),
            default_statuses: None,
            guard_concurrent_accept: false,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment-style overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_id) = lookup(ENV_BASE_ID).filter(|v| !v.trim().is_empty()) {
            self.base_id = Some(base_id.trim().to_string());
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }

    pub fn require_base_id(&self) -> Result<&str> {
        self.base_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No Airtable base configured. Set {} or add \"base_id\" to {}",
                    ENV_BASE_ID,
                    Self::config_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|_| CONFIG_FILE.to_string())
                )
            })
    }

    /// The access token from the environment, else from the keychain.
    pub fn resolve_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
        let base_id = self.require_base_id()?;
        CredentialStore::get_token(base_id).with_context(|| {
            format!(
                "No access token found. Set {} or run `birdline set-token`",
                ENV_ACCESS_TOKEN
            )
        })
    }

    pub fn status_filter(&self) -> StatusFilter {
        match self.default_statuses {
            Some(ref statuses) => StatusFilter::from_statuses(statuses.iter().copied()),
            None => StatusFilter::default(),
        }
    }

    pub fn transition_guard(&self) -> TransitionGuard {
        if self.guard_concurrent_accept {
            TransitionGuard::RecheckStatus
        } else {
            TransitionGuard::LastWriterWins
        }
    }
}
