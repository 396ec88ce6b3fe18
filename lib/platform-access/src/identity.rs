//! Per-request identities and the verifiers that produce them.

use async_trait::async_trait;
use serde::Serialize;

use crate::role::{Role, RoleSet};

/// Handle given to anonymous callers.
pub const GUEST_HANDLE: &str = "guest";

/// Who is making a request, and what they may do.
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    handle: String,
    roles: RoleSet,
}

impl Identity {
    /// Creates an identity with the given handle and roles.
    #[must_use]
    pub fn new(handle: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            handle: handle.into(),
            roles,
        }
    }

    /// The anonymous identity.
    #[must_use]
    pub fn guest() -> Self {
        Self::new(GUEST_HANDLE, RoleSet::guest())
    }

    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns true if the identity holds every role in `required`.
    #[must_use]
    pub fn has_roles(&self, required: &[Role]) -> bool {
        self.roles.contains_all(required)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.roles.contains(Role::Authenticated)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_roles(&[Role::Authenticated, Role::Admin])
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::guest()
    }
}

/// Maps a bearer or cookie token to an identity.
///
/// Returning `None` means the token did not verify; the caller then treats
/// the request as anonymous.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Identity>;
}

/// Development verifier that trusts every non-empty token.
///
/// Any token yields the `developer` handle with authenticated and admin
/// roles. Never enable this outside local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyToken;

/// Handle given by [`AcceptAnyToken`].
pub const DEVELOPER_HANDLE: &str = "developer";

#[async_trait]
impl TokenVerifier for AcceptAnyToken {
    async fn verify(&self, token: &str) -> Option<Identity> {
        if token.is_empty() {
            return None;
        }
        Some(Identity::new(DEVELOPER_HANDLE, RoleSet::admin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_is_neither_authenticated_nor_admin() {
        let guest = Identity::guest();
        assert_eq!(guest.handle(), "guest");
        assert!(!guest.is_authenticated());
        assert!(!guest.is_admin());
        assert!(guest.has_roles(&[Role::Guest]));
    }

    #[test]
    fn admin_without_authenticated_is_not_admin() {
        let odd = Identity::new(
            "odd",
            serde_json::from_str(r#"{"roles":["admin"]}"#).expect("role set"),
        );
        assert!(!odd.is_admin());
        assert!(odd.has_roles(&[Role::Admin]));
    }

    #[test]
    fn has_roles_uses_all_of_semantics() {
        let user = Identity::new("alice", RoleSet::authenticated());
        assert!(user.has_roles(&[Role::Authenticated]));
        assert!(!user.has_roles(&[Role::Authenticated, Role::Admin]));
        assert!(user.has_roles(&[]));
    }

    #[tokio::test]
    async fn accept_any_token_grants_admin() {
        let identity = AcceptAnyToken.verify("anything").await.expect("identity");
        assert_eq!(identity.handle(), DEVELOPER_HANDLE);
        assert!(identity.is_authenticated());
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn accept_any_token_rejects_empty_token() {
        assert!(AcceptAnyToken.verify("").await.is_none());
    }
}
