//! Credential pool with rotating-window pseudo-random selection.
//!
//! Fully random selection across a large pool would keep every credential a
//! little bit hot and still trip upstream per-credential burst limits. The
//! pool instead derives a deterministic window of consecutive entries from
//! `hash(secret || floor(now / rotation_window))` and picks randomly only
//! within that window: the window slides every `rotation_window` seconds so
//! load spreads over the whole pool over time, while at most
//! `candidate_count` credentials are hot at once.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use drivegate_common::{Error, Result};
use drivegate_crypto::TokenSealer;

use crate::credential::{Account, Credential};

/// Namespace under which remote credential blobs are sealed.
pub const NS_ACCOUNT: &str = "account";

/// Timeout for fetching a remote credential blob.
const LOCATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// A pool entry as it appears in configuration: either an inline credential
/// or an opaque locator URL pointing at a sealed remote blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoolSource {
    Locator(String),
    Inline(Credential),
}

/// Selection tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Seconds a selection window stays valid.
    pub rotation_window: u64,
    /// Number of consecutive pool slots eligible within one window.
    pub candidate_count: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            rotation_window: 60,
            candidate_count: 10,
        }
    }
}

enum PoolEntry {
    Inline(Arc<Account>),
    Locator(String),
}

/// The catalog of credentials and the selection algorithm over it.
pub struct AccountPool {
    entries: Vec<PoolEntry>,
    config: PoolConfig,
    secret: String,
    sealer: TokenSealer,
    http: reqwest::Client,
}

impl AccountPool {
    /// Build a pool from configuration sources.
    ///
    /// Inline credentials get their token cache allocated once here, so the
    /// cache survives across selections; locators are resolved lazily on
    /// every selection and carry no persistent cache.
    pub fn new(
        sources: Vec<PoolSource>,
        config: PoolConfig,
        secret: impl Into<String>,
        sealer: TokenSealer,
        http: reqwest::Client,
    ) -> Self {
        let entries = sources
            .into_iter()
            .map(|source| match source {
                PoolSource::Inline(credential) => {
                    PoolEntry::Inline(Arc::new(Account::new(credential)))
                }
                PoolSource::Locator(url) => PoolEntry::Locator(url),
            })
            .collect();

        Self {
            entries,
            config,
            secret: secret.into(),
            sealer,
            http,
        }
    }

    /// Number of entries in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no credentials at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices eligible for selection at `now_secs` (Unix seconds).
    ///
    /// Deterministic: two calls within the same rotation window yield the
    /// same candidate set. When the pool fits inside the candidate count
    /// every entry is always eligible.
    pub fn candidate_indices(&self, now_secs: u64) -> Vec<usize> {
        let len = self.entries.len();
        if len <= self.config.candidate_count {
            return (0..len).collect();
        }

        let window = now_secs / self.config.rotation_window;
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(window.to_string().as_bytes());
        let digest = hasher.finalize();

        let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let start = seed as usize % len;

        (0..self.config.candidate_count)
            .map(|j| (start + j) % len)
            .collect()
    }

    /// Select a credential: deterministic window, uniform draw within it,
    /// lazy resolution of locator entries.
    pub async fn select(&self) -> Result<Arc<Account>> {
        if self.entries.is_empty() {
            return Err(Error::Config("credential pool is empty".to_string()));
        }

        let now_secs = chrono::Utc::now().timestamp() as u64;
        let candidates = self.candidate_indices(now_secs);
        let pick = candidates[rand::rng().random_range(0..candidates.len())];

        match &self.entries[pick] {
            PoolEntry::Inline(account) => Ok(account.clone()),
            PoolEntry::Locator(url) => self.resolve_locator(url).await,
        }
    }

    /// Fetch and unseal a remote credential blob.
    async fn resolve_locator(&self, url: &str) -> Result<Arc<Account>> {
        tracing::debug!(url, "resolving credential locator");

        let response = self
            .http
            .get(url)
            .timeout(LOCATOR_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("credential locator fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "credential locator fetch failed: status {}",
                response.status()
            )));
        }

        let blob = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("credential locator read failed: {}", e)))?;

        let plaintext = self
            .sealer
            .open_raw(NS_ACCOUNT, &blob)
            .map_err(|_| Error::Upstream("credential blob failed to authenticate".to_string()))?;

        let credential: Credential = serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Upstream(format!("credential blob malformed: {}", e)))?;

        Ok(Arc::new(Account::new(credential)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline_credential(i: usize) -> PoolSource {
        PoolSource::Inline(Credential::AuthorizedUser {
            client_id: format!("client-{}", i),
            client_secret: "s".to_string(),
            refresh_token: "r".to_string(),
        })
    }

    fn pool(size: usize, candidates: usize) -> AccountPool {
        AccountPool::new(
            (0..size).map(inline_credential).collect(),
            PoolConfig {
                rotation_window: 60,
                candidate_count: candidates,
            },
            "pool-secret",
            TokenSealer::new("pool-secret"),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_small_pool_everyone_is_candidate() {
        let p = pool(5, 10);
        assert_eq!(p.candidate_indices(1234), vec![0, 1, 2, 3, 4]);
        assert_eq!(p.candidate_indices(999_999), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_window_is_deterministic() {
        let p = pool(100, 10);

        // Same rotation window, any second within it: identical candidates.
        let a = p.candidate_indices(600);
        let b = p.candidate_indices(659);
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn test_window_entries_are_consecutive_mod_len() {
        let p = pool(100, 10);
        let candidates = p.candidate_indices(600);

        for pair in candidates.windows(2) {
            assert_eq!((pair[0] + 1) % 100, pair[1]);
        }
    }

    #[test]
    fn test_windows_slide_over_time() {
        let p = pool(100, 10);

        // Across many rotation windows the start index must move; a fixed
        // window would pin load to ten credentials forever.
        let first = p.candidate_indices(0);
        let moved = (1..50u64).any(|w| p.candidate_indices(w * 60) != first);
        assert!(moved);
    }

    #[test]
    fn test_secret_changes_window() {
        let a = pool(100, 10);
        let b = AccountPool::new(
            (0..100).map(inline_credential).collect(),
            PoolConfig {
                rotation_window: 60,
                candidate_count: 10,
            },
            "other-secret",
            TokenSealer::new("other-secret"),
            reqwest::Client::new(),
        );

        let differs = (0..50u64).any(|w| a.candidate_indices(w * 60) != b.candidate_indices(w * 60));
        assert!(differs);
    }

    #[tokio::test]
    async fn test_select_returns_candidate() {
        let p = pool(3, 10);
        let account = p.select().await.unwrap();
        match account.credential() {
            Credential::AuthorizedUser { client_id, .. } => {
                assert!(client_id.starts_with("client-"));
            }
            _ => panic!("unexpected credential kind"),
        }
    }

    #[tokio::test]
    async fn test_empty_pool_is_config_error() {
        let p = pool(0, 10);
        assert!(p.select().await.is_err());
    }

    #[test]
    fn test_pool_source_untagged_parse() {
        let locator: PoolSource = serde_json::from_str(r#""https://example.com/blob/1""#).unwrap();
        assert!(matches!(locator, PoolSource::Locator(_)));

        let inline: PoolSource = serde_json::from_str(
            r#"{"type":"authorized_user","client_id":"c","client_secret":"s","refresh_token":"r"}"#,
        )
        .unwrap();
        assert!(matches!(inline, PoolSource::Inline(_)));
    }
}
