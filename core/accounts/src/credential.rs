//! Credential descriptors and the per-account token cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

/// A set of fields sufficient to obtain a bearer token from the upstream
/// identity provider.
///
/// Wire-compatible with the Google credential JSON formats: the `type` tag
/// distinguishes a delegated user (refresh-token grant) from a service
/// account (signed JWT-bearer grant). Everything here is immutable for the
/// process lifetime; the mutable token cache lives on [`Account`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credential {
    /// Delegated-user credential, typically produced by `gcloud auth`.
    #[serde(rename = "authorized_user")]
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },

    /// Service-account credential with an RSA signing key.
    #[serde(rename = "service_account")]
    ServiceAccount {
        client_email: String,
        private_key_id: String,
        private_key: String,
        token_uri: String,
        project_id: String,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::AuthorizedUser { client_id, .. } => f
                .debug_struct("AuthorizedUser")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
            Credential::ServiceAccount {
                client_email,
                private_key_id,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("client_email", client_email)
                .field("private_key_id", private_key_id)
                .field("private_key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A cached bearer token with its absolute expiry.
///
/// The expiry is already discounted by the refresh safety margin when the
/// token is stored, so freshness is a plain comparison against now.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Whether the token can still be used without a refresh.
    pub fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// A credential plus its process-local token cache.
///
/// The cache is owned by the account value, not by any global registry, so
/// multiple pools can coexist in one process. Concurrent refreshes of the
/// same account may race; the loser wastes one upstream call but cannot
/// corrupt state.
pub struct Account {
    credential: Credential,
    pub(crate) cached: RwLock<Option<CachedToken>>,
}

impl Account {
    /// Wrap a credential with an empty token cache.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            cached: RwLock::new(None),
        }
    }

    /// Wrap a credential with a pre-populated cache.
    pub fn with_cached(credential: Credential, cached: CachedToken) -> Self {
        Self {
            credential,
            cached: RwLock::new(Some(cached)),
        }
    }

    /// The immutable credential descriptor.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("credential", &self.credential)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_credential_tagged_deserialization() {
        let user: Credential = serde_json::from_str(
            r#"{"type":"authorized_user","client_id":"c","client_secret":"s","refresh_token":"r"}"#,
        )
        .unwrap();
        assert!(matches!(user, Credential::AuthorizedUser { .. }));

        let sa: Credential = serde_json::from_str(
            r#"{"type":"service_account","client_email":"e","private_key_id":"k",
                "private_key":"p","token_uri":"t","project_id":"pr"}"#,
        )
        .unwrap();
        assert!(matches!(sa, Credential::ServiceAccount { .. }));
    }

    #[test]
    fn test_credential_roundtrip_keeps_tag() {
        let cred = Credential::AuthorizedUser {
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            refresh_token: "r".to_string(),
        };

        let json = serde_json::to_string(&cred).unwrap();
        assert!(json.contains(r#""type":"authorized_user""#));

        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = Credential::AuthorizedUser {
            client_id: "cid".to_string(),
            client_secret: "very-secret".to_string(),
            refresh_token: "very-private".to_string(),
        };

        let debug = format!("{:?}", cred);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("very-private"));
        assert!(debug.contains("cid"));
    }

    #[test]
    fn test_cached_token_freshness() {
        let fresh = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(fresh.is_fresh());

        let stale = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        assert!(!stale.is_fresh());
    }
}
