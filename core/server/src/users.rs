//! Remote user directory.
//!
//! User records live as sealed blobs in an external store, addressed by
//! `hash(secret || name)` so the blob names leak nothing about the user
//! base. The directory is consulted on login and re-consulted on every
//! authenticated request, so revoking a user is just deleting (or
//! editing) their blob.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use drivegate_common::{Error, Result};
use drivegate_crypto::TokenSealer;

/// Namespace under which user-record blobs are sealed.
pub const NS_USER: &str = "user";

/// Timeout for fetching a user blob.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// A user record as stored in the directory.
///
/// `allow_list` restricts top-level drive visibility when present;
/// `deny_list` hides its drives everywhere, including inside folders and
/// search results. Wire names keep the store format the frontend already
/// understands.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub pass: String,
    #[serde(
        rename = "drives_white_list",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_list: Option<Vec<String>>,
    #[serde(
        rename = "drives_black_list",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deny_list: Option<Vec<String>>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("pass", &"[REDACTED]")
            .field("allow_list", &self.allow_list)
            .field("deny_list", &self.deny_list)
            .finish()
    }
}

/// Derives the opaque blob name for a user: lowercase hex of
/// `Blake2b-256(secret || name)`.
pub fn user_blob_name(secret: &str, name: &str) -> String {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(secret.as_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Client for the external user-directory blob store.
#[derive(Clone)]
pub struct UserDirectory {
    http: reqwest::Client,
    base_url: String,
    secret: String,
    sealer: TokenSealer,
}

impl UserDirectory {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        secret: impl Into<String>,
        sealer: TokenSealer,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            secret: secret.into(),
            sealer,
        }
    }

    /// Full URL of a user's sealed blob.
    pub fn user_url(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            user_blob_name(&self.secret, name)
        )
    }

    /// Fetch and unseal a user record.
    ///
    /// A missing blob means the user does not exist; both cases come back
    /// as `Error::Auth` so callers cannot distinguish an unknown name from
    /// a tampered record.
    pub async fn lookup(&self, name: &str) -> Result<User> {
        let url = self.user_url(name);
        tracing::debug!(name, "looking up user record");

        let response = self
            .http
            .get(&url)
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("user directory fetch failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Auth("unknown user".to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "user directory fetch failed: status {}",
                response.status()
            )));
        }

        let blob = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("user directory read failed: {}", e)))?;

        let plaintext = self
            .sealer
            .open_raw(NS_USER, &blob)
            .map_err(|_| Error::Auth("user record failed to authenticate".to_string()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|_| Error::Auth("user record malformed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_name_is_hex_and_keyed_by_secret() {
        let a = user_blob_name("secret-a", "alice");
        let b = user_blob_name("secret-b", "alice");
        let c = user_blob_name("secret-a", "bob");

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_ne!(a, c);

        // Deterministic: same inputs, same name.
        assert_eq!(a, user_blob_name("secret-a", "alice"));
    }

    #[test]
    fn test_user_url_joins_cleanly() {
        let directory = UserDirectory::new(
            reqwest::Client::new(),
            "https://blobs.example.com/users/",
            "s",
            TokenSealer::new("s"),
        );
        let url = directory.user_url("alice");

        assert!(url.starts_with("https://blobs.example.com/users/"));
        assert!(!url.contains("//users//"));
        assert!(!url.contains("alice"));
    }

    #[test]
    fn test_user_wire_names() {
        let json = r#"{
            "name": "alice",
            "pass": "pw",
            "drives_white_list": ["drive-a"],
            "drives_black_list": ["drive-b"]
        }"#;
        let user: User = serde_json::from_str(json).unwrap();

        assert_eq!(user.allow_list.as_deref(), Some(&["drive-a".to_string()][..]));
        assert_eq!(user.deny_list.as_deref(), Some(&["drive-b".to_string()][..]));

        let out = serde_json::to_value(&user).unwrap();
        assert!(out.get("drives_white_list").is_some());
        assert!(out.get("allow_list").is_none());
    }

    #[test]
    fn test_debug_redacts_pass() {
        let user = User {
            name: "alice".to_string(),
            pass: "hunter2".to_string(),
            allow_list: None,
            deny_list: None,
        };
        let debug = format!("{:?}", user);

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }
}
