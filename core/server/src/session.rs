//! Sealed session tokens.
//!
//! Login seals the submitted name and password into a `userToken` the
//! client carries in the `t` cookie (or a `t` query parameter, for links
//! that cannot carry cookies). Every authenticated request re-opens the
//! token and re-checks it against the live directory record, so a changed
//! password or deleted user invalidates outstanding sessions immediately.

use http::header::COOKIE;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use drivegate_common::{Error, Result};
use drivegate_crypto::TokenSealer;

use crate::users::{User, UserDirectory};

/// Namespace for session tokens.
pub const NS_USER_TOKEN: &str = "userToken";

#[derive(Serialize, Deserialize)]
struct SessionClaims {
    name: String,
    pass: String,
}

/// Seal a session token for an authenticated user.
pub fn issue_session(sealer: &TokenSealer, user: &User) -> Result<String> {
    sealer.seal_json(
        NS_USER_TOKEN,
        &SessionClaims {
            name: user.name.clone(),
            pass: user.pass.clone(),
        },
    )
}

/// Extract the session token from a request: the `t` cookie wins, the `t`
/// query parameter is the fallback.
pub fn session_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(token) = cookie_value(headers, "t") {
        return Some(token);
    }
    query.get("t").filter(|t| !t.is_empty()).cloned()
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(name) {
            let value = parts.next().unwrap_or("");
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Open a session token and re-validate it against the directory.
///
/// The sealed claims must still match the stored record exactly; a stale
/// token (password changed, user removed) is rejected as `Error::Auth`.
pub async fn authenticate(
    directory: &UserDirectory,
    sealer: &TokenSealer,
    token: &str,
) -> Result<User> {
    let claims: SessionClaims = sealer.open_json(NS_USER_TOKEN, token)?;
    let user = directory.lookup(&claims.name).await?;

    if user.name != claims.name || user.pass != claims.pass {
        return Err(Error::Auth("session is stale".to_string()));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with_cookie(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(raw).unwrap());
        headers
    }

    #[test]
    fn test_cookie_preferred_over_query() {
        let headers = headers_with_cookie("a=1; t=cookie-token; b=2");
        let query: HashMap<String, String> =
            [("t".to_string(), "query-token".to_string())].into_iter().collect();

        assert_eq!(
            session_token(&headers, &query).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn test_query_fallback() {
        let headers = HeaderMap::new();
        let query: HashMap<String, String> =
            [("t".to_string(), "query-token".to_string())].into_iter().collect();

        assert_eq!(
            session_token(&headers, &query).as_deref(),
            Some("query-token")
        );
        assert!(session_token(&headers, &HashMap::new()).is_none());
    }

    #[test]
    fn test_empty_values_ignored() {
        let headers = headers_with_cookie("t=");
        let query: HashMap<String, String> =
            [("t".to_string(), String::new())].into_iter().collect();

        assert!(session_token(&headers, &query).is_none());
    }

    #[test]
    fn test_issued_session_opens_under_namespace() {
        let sealer = TokenSealer::new("session-secret");
        let user = User {
            name: "alice".to_string(),
            pass: "pw".to_string(),
            allow_list: None,
            deny_list: None,
        };

        let token = issue_session(&sealer, &user).unwrap();
        let claims: SessionClaims = sealer.open_json(NS_USER_TOKEN, &token).unwrap();
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.pass, "pw");

        // A session token is not a valid continuation token.
        assert!(sealer.open_json::<SessionClaims>("pageToken", &token).is_err());
    }
}
