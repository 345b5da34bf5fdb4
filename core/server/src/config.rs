//! Server configuration.
//!
//! A single JSON document supplies everything the process needs: the
//! sealing secret, the credential pool, and the two external blob stores
//! (user directory and static frontend). Selection tunables default to
//! the values the pool was designed around.

use serde::{Deserialize, Serialize};

use drivegate_accounts::{PoolConfig, PoolSource};
use drivegate_common::{Error, Result};

/// Top-level configuration document.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Master sealing secret. Every token namespace derives from it.
    pub secret: String,
    /// Listen address for the HTTP server.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Credential pool: inline credentials and/or locator URLs.
    pub accounts: Vec<PoolSource>,
    /// Seconds a selection window stays valid.
    #[serde(default = "default_rotation")]
    pub account_rotation: u64,
    /// Credentials eligible within one selection window.
    #[serde(default = "default_candidates")]
    pub account_candidates: usize,
    /// Base URL of the user-directory blob store.
    pub user_url: String,
    /// Base URL of the static frontend assets.
    pub static_url: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_rotation() -> u64 {
    60
}

fn default_candidates() -> usize {
    10
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;

        if config.secret.is_empty() {
            return Err(Error::Config("secret must not be empty".to_string()));
        }
        if config.accounts.is_empty() {
            return Err(Error::Config(
                "at least one account must be configured".to_string(),
            ));
        }
        // Zero would divide the selection clock or empty the candidate
        // window at request time.
        if config.account_rotation == 0 {
            return Err(Error::Config("account_rotation must be nonzero".to_string()));
        }
        if config.account_candidates == 0 {
            return Err(Error::Config(
                "account_candidates must be nonzero".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            rotation_window: self.account_rotation,
            candidate_count: self.account_candidates,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"[REDACTED]")
            .field("listen", &self.listen)
            .field("accounts", &self.accounts.len())
            .field("account_rotation", &self.account_rotation)
            .field("account_candidates", &self.account_candidates)
            .field("user_url", &self.user_url)
            .field("static_url", &self.static_url)
            .finish()
    }
}
