//! Application configuration management.
//!
//! This module handles loading the client configuration: the
//! backend base URL, request timeout, and where the session is kept.
//!
//! Configuration is stored at `~/.config/gymtrack/config.json`. Values from
//! a `.env` file and `GYMTRACK_*` environment variables take precedence.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::HttpTransport;
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionManager, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "gymtrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default backend during development
const DEFAULT_API_URL: &str = "http://127.0.0.1:3333";

/// HTTP request timeout in seconds.
/// 30s allows for slow mobile connections while failing fast enough for good UX.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "GYMTRACK_API_URL";
const ENV_TIMEOUT_SECS: &str = "GYMTRACK_TIMEOUT_SECS";
const ENV_TOKEN_STORE: &str = "GYMTRACK_TOKEN_STORE";

/// Where the session is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for TokenStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(TokenStoreKind::File),
            "keyring" => Ok(TokenStoreKind::Keyring),
            "memory" => Ok(TokenStoreKind::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown token store {:?} (expected file, keyring or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub token_store: TokenStoreKind,
    /// Overrides the platform data directory for the session file.
    pub session_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_store: TokenStoreKind::default(),
            session_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply `.env` and environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;

        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();
        config.apply_overrides(|key| std::env::var(key).ok())?;

        debug!(api_url = %config.api_url, store = ?config.token_store, "Config loaded");
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(secs) = var(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got {:?}", ENV_TIMEOUT_SECS, secs))?;
        }
        if let Some(kind) = var(ENV_TOKEN_STORE) {
            self.token_store = kind.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn session_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.session_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::new(self.session_dir()?)),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new()),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }

    pub fn transport(&self) -> Result<HttpTransport> {
        HttpTransport::new(&self.api_url, self.request_timeout())
            .with_context(|| format!("Failed to create HTTP client for {}", self.api_url))
    }

    /// Session manager wired to the configured backend and token store.
    /// The returned manager is in the `Unknown` state; call `bootstrap` next.
    pub fn session_manager(&self) -> Result<SessionManager> {
        Ok(SessionManager::new(self.transport()?, self.token_store()?))
    }
}
