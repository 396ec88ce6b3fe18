//! Identity resolution for inbound requests.
//!
//! The credential comes from an `Authorization: Bearer <token>` header if one
//! is present and well formed, otherwise from the session cookie. A request
//! with no credential, or one that fails verification, is a guest.

use axum_extra::extract::CookieJar;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::fmt;
use std::sync::Arc;
use wraith_platform_access::{Identity, TokenVerifier};

/// Returns the bearer token from the `Authorization` header.
///
/// The header is split on its first space; the scheme must be exactly
/// `Bearer` and the trimmed token must be non-empty.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme != "Bearer" {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Returns the value of cookie `name`, if present and non-empty.
#[must_use]
pub fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the request's credential: bearer header first, then cookie.
#[must_use]
pub fn credential(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers, cookie_name))
}

/// Maps request credentials to identities.
#[derive(Clone)]
pub struct IdentityResolver {
    cookie_name: String,
    verifier: Arc<dyn TokenVerifier>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            verifier,
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolves the identity for a request.
    pub async fn resolve(&self, headers: &HeaderMap) -> Identity {
        let Some(token) = credential(headers, &self.cookie_name) else {
            return Identity::guest();
        };
        match self.verifier.verify(&token).await {
            Some(identity) => identity,
            None => {
                tracing::debug!("credential did not verify; treating as guest");
                Identity::guest()
            }
        }
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::COOKIE;
    use wraith_platform_access::{AcceptAnyToken, RoleSet, SessionStore};

    const COOKIE_NAME: &str = "wraith-session";

    fn headers(pairs: &[(http::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).expect("header value"));
        }
        map
    }

    #[test]
    fn bearer_token_is_trimmed() {
        let h = headers(&[(AUTHORIZATION, "Bearer   abc123  ")]);
        assert_eq!(bearer_token(&h), Some("abc123".to_string()));
    }

    #[test]
    fn bearer_scheme_is_case_sensitive() {
        let h = headers(&[(AUTHORIZATION, "bearer abc123")]);
        assert_eq!(bearer_token(&h), None);
        let h = headers(&[(AUTHORIZATION, "Basic abc123")]);
        assert_eq!(bearer_token(&h), None);
    }

    #[test]
    fn malformed_bearer_header_falls_through_to_cookie() {
        for auth in ["Bearer", "Bearer    ", "abc123"] {
            let h = headers(&[
                (AUTHORIZATION, auth),
                (COOKIE, "wraith-session=from-cookie"),
            ]);
            assert_eq!(
                credential(&h, COOKIE_NAME),
                Some("from-cookie".to_string()),
                "header {auth:?}"
            );
        }
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let h = headers(&[
            (AUTHORIZATION, "Bearer from-header"),
            (COOKIE, "wraith-session=from-cookie"),
        ]);
        assert_eq!(credential(&h, COOKIE_NAME), Some("from-header".to_string()));
    }

    #[test]
    fn other_cookies_are_ignored() {
        let h = headers(&[(COOKIE, "theme=dark; other=value")]);
        assert_eq!(credential(&h, COOKIE_NAME), None);
        let h = headers(&[(COOKIE, "wraith-session=")]);
        assert_eq!(credential(&h, COOKIE_NAME), None);
    }

    #[tokio::test]
    async fn no_credential_is_guest() {
        let resolver = IdentityResolver::new(COOKIE_NAME, Arc::new(SessionStore::default()));
        let identity = resolver.resolve(&HeaderMap::new()).await;
        assert_eq!(identity, Identity::guest());
    }

    #[tokio::test]
    async fn unverified_token_is_guest() {
        let resolver = IdentityResolver::new(COOKIE_NAME, Arc::new(SessionStore::default()));
        let h = headers(&[(AUTHORIZATION, "Bearer forged")]);
        let identity = resolver.resolve(&h).await;
        assert!(!identity.is_authenticated());
    }

    #[tokio::test]
    async fn session_cookie_resolves_to_session_identity() {
        let sessions = Arc::new(SessionStore::default());
        let session = sessions
            .issue("1234", "alice@example.com", RoleSet::authenticated())
            .expect("issue");
        let resolver = IdentityResolver::new(COOKIE_NAME, sessions);

        let cookie = format!("{COOKIE_NAME}={}", session.id().as_str());
        let identity = resolver.resolve(&headers(&[(COOKIE, cookie.as_str())])).await;
        assert_eq!(identity.handle(), "1234");
        assert!(identity.is_authenticated());
        assert!(!identity.is_admin());
    }

    #[tokio::test]
    async fn permissive_verifier_grants_admin_to_any_token() {
        let resolver = IdentityResolver::new(COOKIE_NAME, Arc::new(AcceptAnyToken));
        let identity = resolver
            .resolve(&headers(&[(AUTHORIZATION, "Bearer anything")]))
            .await;
        assert!(identity.is_admin());
    }
}
