use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::authenticator::RelyingParty;
use crate::errors::{Result, VaultError};

/// Project-level configuration, loaded from `.housevault.toml`.
///
/// Every field has a sensible default so the vault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding the store database,
    /// passkey keystore and audit log.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Relying party id passkeys are scoped to.
    #[serde(default = "default_rp_id")]
    pub rp_id: String,

    /// Relying party name shown during registration.
    #[serde(default = "default_rp_name")]
    pub rp_name: String,

    /// How long a passkey ceremony may take, in milliseconds.
    #[serde(default = "default_ceremony_timeout_ms")]
    pub ceremony_timeout_ms: u64,

    /// Log filter used when neither `HOUSEVAULT_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    ".housevault".to_string()
}

fn default_rp_id() -> String {
    "localhost".to_string()
}

fn default_rp_name() -> String {
    "House Vault".to_string()
}

fn default_ceremony_timeout_ms() -> u64 {
    60_000
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rp_id: default_rp_id(),
            rp_name: default_rp_name(),
            ceremony_timeout_ms: default_ceremony_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".housevault.toml";

    /// Load settings from `<project_dir>/.housevault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.rp_id.trim().is_empty() {
            return Err(VaultError::ConfigError(format!(
                "{}: rp_id must not be empty",
                config_path.display()
            )));
        }

        Ok(settings)
    }

    /// Resolve the data directory against the project root.
    ///
    /// Example: `project_dir/.housevault`
    pub fn data_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.data_dir)
    }

    pub fn relying_party(&self) -> RelyingParty {
        RelyingParty {
            id: self.rp_id.clone(),
            name: self.rp_name.clone(),
        }
    }

    pub fn ceremony_timeout(&self) -> Duration {
        Duration::from_millis(self.ceremony_timeout_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
