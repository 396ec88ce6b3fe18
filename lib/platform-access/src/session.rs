//! Sessions for users who completed a provider login.
//!
//! A session is created after a successful callback and is identified by an
//! opaque random token that travels back in a cookie (or as a bearer token).
//! Sessions live in memory only; a restart logs everyone out.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use wraith_core::{Clock, SystemClock};

use crate::error::RandomSourceError;
use crate::identity::{Identity, TokenVerifier};
use crate::role::RoleSet;
use crate::token::random_token;

/// Default session lifetime.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::hours(8);

/// Opaque session token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from a string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An active login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    /// Provider-assigned user id; doubles as the identity handle.
    handle: String,
    email: String,
    roles: RoleSet,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns the identity this session grants.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.handle.clone(), self.roles.clone())
    }
}

/// In-memory store of active sessions.
#[derive(Debug)]
pub struct SessionStore {
    duration: Duration,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    /// Creates a store on the system clock.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self::with_clock(duration, Arc::new(SystemClock))
    }

    /// Creates a store on the given clock.
    #[must_use]
    pub fn with_clock(duration: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            duration,
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the lifetime given to new sessions.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Starts a session for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source fails.
    pub fn issue(
        &self,
        handle: impl Into<String>,
        email: impl Into<String>,
        roles: RoleSet,
    ) -> Result<Session, Report<RandomSourceError>> {
        let id = SessionId(random_token()?);
        let now = self.clock.now();
        let session = Session {
            id: id.clone(),
            handle: handle.into(),
            email: email.into(),
            roles,
            created_at: now,
            expires_at: now + self.duration,
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, session.clone());
        tracing::info!(
            handle = %session.handle,
            expires_at = %session.expires_at,
            "session issued"
        );
        Ok(session)
    }

    /// Returns the session for `id` if it exists and has not expired.
    #[must_use]
    pub fn find(&self, id: &SessionId) -> Option<Session> {
        let now = self.clock.now();
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .filter(|session| !session.is_expired_at(now))
            .cloned()
    }

    /// Ends a session, returning true if it existed.
    pub fn revoke(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if let Some(session) = &removed {
            tracing::info!(handle = %session.handle, "session revoked");
        }
        removed.is_some()
    }

    /// Removes every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_DURATION)
    }
}

#[async_trait]
impl TokenVerifier for SessionStore {
    async fn verify(&self, token: &str) -> Option<Identity> {
        self.find(&SessionId::from(token))
            .map(|session| session.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wraith_core::ManualClock;

    fn store_with_clock() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = SessionStore::with_clock(Duration::hours(1), clock.clone());
        (store, clock)
    }

    #[test]
    fn issued_session_has_correct_fields() {
        let (store, clock) = store_with_clock();
        let session = store
            .issue("1234", "alice@example.com", RoleSet::authenticated())
            .expect("issue");

        assert_eq!(session.handle(), "1234");
        assert_eq!(session.email(), "alice@example.com");
        assert_eq!(session.roles(), &RoleSet::authenticated());
        assert_eq!(session.created_at(), clock.now());
        assert_eq!(session.expires_at(), clock.now() + Duration::hours(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn find_returns_live_session() {
        let (store, _clock) = store_with_clock();
        let session = store
            .issue("1234", "alice@example.com", RoleSet::admin())
            .expect("issue");

        let found = store.find(session.id()).expect("session");
        assert_eq!(found, session);
    }

    #[test]
    fn find_ignores_expired_session() {
        let (store, clock) = store_with_clock();
        let session = store
            .issue("1234", "alice@example.com", RoleSet::authenticated())
            .expect("issue");

        clock.advance(Duration::hours(1));
        assert!(store.find(session.id()).is_none());
    }

    #[test]
    fn revoke_removes_session() {
        let (store, _clock) = store_with_clock();
        let session = store
            .issue("1234", "alice@example.com", RoleSet::authenticated())
            .expect("issue");

        assert!(store.revoke(session.id()));
        assert!(!store.revoke(session.id()));
        assert!(store.find(session.id()).is_none());
    }

    #[test]
    fn purge_expired_keeps_live_sessions() {
        let (store, clock) = store_with_clock();
        store
            .issue("old", "old@example.com", RoleSet::authenticated())
            .expect("issue");
        clock.advance(Duration::minutes(30));
        let live = store
            .issue("new", "new@example.com", RoleSet::authenticated())
            .expect("issue");
        clock.advance(Duration::minutes(45));

        assert_eq!(store.purge_expired(), 1);
        assert!(store.find(live.id()).is_some());
    }

    #[test]
    fn session_id_debug_does_not_leak_token() {
        let id = SessionId::from("secret-token");
        assert!(!format!("{id:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn verify_maps_session_to_identity() {
        let (store, _clock) = store_with_clock();
        let session = store
            .issue("1234", "root@example.com", RoleSet::admin())
            .expect("issue");

        let identity = store
            .verify(session.id().as_str())
            .await
            .expect("identity");
        assert_eq!(identity.handle(), "1234");
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn verify_rejects_unknown_token() {
        let (store, _clock) = store_with_clock();
        assert!(store.verify("not-a-session").await.is_none());
        assert!(store.verify("").await.is_none());
    }
}
