//! Single-use, time-limited nonces for the OAuth2 `state` parameter.
//!
//! A nonce is minted when a login starts and must come back, unchanged, on
//! the provider's callback. Lookups are destructive: a nonce validates at most
//! once, and an expired nonce never validates. Expired nonces that are never
//! looked up are purged by a sweep that runs from `lookup` once the
//! next-sweep time has passed, or on demand via [`NonceStore::purge_expired`].
//!
//! The store is purely in-memory. Handshakes in flight when the process
//! restarts are lost and the user simply logs in again.

use chrono::{DateTime, Duration, Utc};
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wraith_core::{Clock, SystemClock};

use crate::error::RandomSourceError;
use crate::token::random_token;

/// Default lifetime of a nonce.
pub const DEFAULT_NONCE_TTL: Duration = Duration::minutes(5);

/// Default interval between lookup-driven sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::minutes(15);

/// An opaque anti-forgery token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Returns the nonce as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the nonce, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(..)")
    }
}

#[derive(Debug)]
struct NonceState {
    /// Nonce value to expiry.
    entries: HashMap<String, DateTime<Utc>>,
    next_sweep: DateTime<Utc>,
}

impl NonceState {
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before - self.entries.len()
    }
}

/// Shared store of outstanding nonces.
///
/// Every operation runs under a single mutex.
#[derive(Debug)]
pub struct NonceStore {
    ttl: Duration,
    sweep_interval: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<NonceState>,
}

impl NonceStore {
    /// Creates a store on the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a store on the given clock.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            ttl,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            clock,
            state: Mutex::new(NonceState {
                entries: HashMap::new(),
                next_sweep: now,
            }),
        }
    }

    /// Overrides the interval between lookup-driven sweeps.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Returns the lifetime given to new nonces.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a new nonce that expires after the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source fails.
    pub fn create(&self) -> Result<Nonce, Report<RandomSourceError>> {
        loop {
            let value = random_token()?;
            let mut state = self.lock();
            let expires_at = self.clock.now() + self.ttl;
            if let Entry::Vacant(slot) = state.entries.entry(value.clone()) {
                slot.insert(expires_at);
                tracing::debug!(%expires_at, outstanding = state.entries.len(), "nonce created");
                return Ok(Nonce(value));
            }
        }
    }

    /// Returns true if `nonce` is outstanding and unexpired.
    ///
    /// The nonce is removed whatever the outcome. If the next-sweep time has
    /// passed, every expired nonce is purged and the next sweep is scheduled.
    pub fn lookup(&self, nonce: &str) -> bool {
        let mut state = self.lock();
        let now = self.clock.now();

        let valid = state
            .entries
            .remove(nonce)
            .is_some_and(|expires_at| now < expires_at);

        if now > state.next_sweep {
            let purged = state.sweep(now);
            state.next_sweep = now + self.sweep_interval;
            if purged > 0 {
                tracing::debug!(purged, "swept expired nonces");
            }
        }

        tracing::debug!(valid, "nonce lookup");
        valid
    }

    /// Purges every expired nonce, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.lock().sweep(now)
    }

    /// Returns the number of nonces held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if no nonces are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, NonceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_TTL)
    }
}
