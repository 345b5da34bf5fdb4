//! Opaque continuation tokens for paginated and searched calls.
//!
//! A continuation token seals the selected credential identity together
//! with the upstream cursor(s). Re-presenting the token pins the same
//! identity for the next page, since upstream cursors are not portable
//! across credentials, and the server never has to remember either.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use drivegate_accounts::Credential;
use drivegate_common::Result;
use drivegate_crypto::TokenSealer;

/// Namespace for pagination and search continuation tokens.
pub const NS_PAGE_TOKEN: &str = "pageToken";

#[derive(Serialize, Deserialize)]
struct ListClaims {
    account: Credential,
    #[serde(rename = "pageToken")]
    page_token: String,
}

#[derive(Serialize, Deserialize)]
struct SearchClaims {
    account: Credential,
    #[serde(rename = "pageTokenMap")]
    cursors: HashMap<String, String>,
}

/// Builds and consumes sealed continuation tokens.
#[derive(Clone)]
pub struct Continuations {
    sealer: TokenSealer,
}

impl Continuations {
    pub fn new(sealer: TokenSealer) -> Self {
        Self { sealer }
    }

    /// Seal a single-collection listing cursor with its identity.
    pub fn issue_list(&self, account: &Credential, cursor: &str) -> Result<String> {
        self.sealer.seal_json(
            NS_PAGE_TOKEN,
            &ListClaims {
                account: account.clone(),
                page_token: cursor.to_string(),
            },
        )
    }

    /// Recover the pinned identity and cursor from a listing token.
    ///
    /// Fails with `Error::Auth` on any forgery or malformation; the caller
    /// must reject the request rather than fall back to a fresh identity.
    pub fn accept_list(&self, token: &str) -> Result<(Credential, String)> {
        let claims: ListClaims = self.sealer.open_json(NS_PAGE_TOKEN, token)?;
        Ok((claims.account, claims.page_token))
    }

    /// Seal a search cursor map, or return `None` when every scope is
    /// exhausted (an empty map means no continuation anywhere).
    pub fn issue_search(
        &self,
        account: &Credential,
        cursors: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        if cursors.is_empty() {
            return Ok(None);
        }
        self.sealer
            .seal_json(
                NS_PAGE_TOKEN,
                &SearchClaims {
                    account: account.clone(),
                    cursors: cursors.clone(),
                },
            )
            .map(Some)
    }

    /// Recover the pinned identity and per-scope cursors from a search
    /// token.
    pub fn accept_search(&self, token: &str) -> Result<(Credential, HashMap<String, String>)> {
        let claims: SearchClaims = self.sealer.open_json(NS_PAGE_TOKEN, token)?;
        Ok((claims.account, claims.cursors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuations() -> Continuations {
        Continuations::new(TokenSealer::new("continuation-secret"))
    }

    fn credential() -> Credential {
        Credential::AuthorizedUser {
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            refresh_token: "r".to_string(),
        }
    }

    #[test]
    fn test_list_token_roundtrip_pins_identity() {
        let c = continuations();
        let token = c.issue_list(&credential(), "upstream-cursor").unwrap();

        let (account, cursor) = c.accept_list(&token).unwrap();
        assert_eq!(account, credential());
        assert_eq!(cursor, "upstream-cursor");
    }

    #[test]
    fn test_forged_token_rejected() {
        let c = continuations();
        let mut token = c.issue_list(&credential(), "cursor").unwrap();
        token.replace_range(..2, "AA");

        assert!(c.accept_list(&token).is_err());
        assert!(c.accept_list("").is_err());
    }

    #[test]
    fn test_session_token_not_accepted_as_cursor() {
        let c = continuations();
        let sealer = TokenSealer::new("continuation-secret");
        let session = sealer
            .seal("userToken", br#"{"name":"a","pass":"b"}"#)
            .unwrap();

        assert!(c.accept_list(&session).is_err());
    }

    #[test]
    fn test_search_token_roundtrip() {
        let c = continuations();
        let cursors: HashMap<String, String> = [
            ("drive-a".to_string(), "ca".to_string()),
            ("global".to_string(), "cg".to_string()),
        ]
        .into_iter()
        .collect();

        let token = c.issue_search(&credential(), &cursors).unwrap().unwrap();
        let (account, opened) = c.accept_search(&token).unwrap();

        assert_eq!(account, credential());
        assert_eq!(opened, cursors);
    }

    #[test]
    fn test_exhausted_search_issues_no_token() {
        let c = continuations();
        let token = c.issue_search(&credential(), &HashMap::new()).unwrap();
        assert!(token.is_none());
    }
}
