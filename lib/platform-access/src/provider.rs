//! The identity provider contract and the registry of configured providers.
//!
//! A provider runs the OAuth2 authorization-code flow against one external
//! identity service. The login URL carries a fresh nonce as `state`; the
//! callback must present that nonce back before any code exchange happens.
//!
//! ```text
//! Unauthenticated --login_url--> PendingCallback --process_callback--> Authenticated
//!                                      |
//!                                      +--(invalid nonce / exchange / fetch)--> Unauthenticated
//! ```
//!
//! Failed callbacks are terminal. The caller restarts from the login URL.

use async_trait::async_trait;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use wraith_core::Version;

use crate::error::{ConfigurationError, ProviderError};
use crate::google::{GoogleConfig, GoogleProvider};
use crate::nonce::NonceStore;

/// The normalized profile a provider returns after a successful callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    /// Provider-assigned user id.
    pub id: String,
    pub name: String,
    pub email: String,
    pub verified_email: bool,
    /// URL of the user's avatar image.
    pub avatar: String,
}

/// The parts of an inbound callback a provider needs.
///
/// Missing `state` or `code` parameters are represented as empty strings;
/// an empty `state` never validates.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub method: http::Method,
    pub state: String,
    pub code: String,
    /// Network calls made while processing the callback must finish by this
    /// instant.
    pub deadline: Instant,
}

impl CallbackRequest {
    /// Creates a callback request whose deadline is `timeout` from now.
    #[must_use]
    pub fn new(
        method: http::Method,
        state: impl Into<String>,
        code: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            method,
            state: state.into(),
            code: code.into(),
            deadline: Instant::now() + timeout,
        }
    }
}

/// One external OAuth2 identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Display name, e.g. `Google`.
    fn name(&self) -> &str;

    /// Stable lowercase identifier used in routes and forms.
    fn code(&self) -> &str;

    fn version(&self) -> &Version;

    /// Mints a nonce and returns the provider's authorization URL carrying it
    /// as `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NonceCreation`] if no nonce could be minted.
    fn login_url(&self) -> Result<String, Report<ProviderError>>;

    /// Validates the callback, exchanges the code and fetches the user's
    /// profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MethodNotAllowed`] for the wrong method and
    /// [`ProviderError::InvalidNonce`] when `state` fails lookup, without
    /// contacting the provider. Transport and payload failures map to the
    /// remaining variants, with the underlying error as the report's cause.
    async fn process_callback(
        &self,
        request: &CallbackRequest,
    ) -> Result<Authentication, Report<ProviderError>>;
}

/// The ordered set of configured providers, immutable after startup.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from a comma-separated list of provider names.
    ///
    /// Names are matched case-insensitively; blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownProvider`] for a name this build
    /// does not implement, or any error from constructing a provider.
    pub fn from_names(
        names: &str,
        google: &GoogleConfig,
        callback_base_url: &str,
        nonces: Arc<NonceStore>,
    ) -> Result<Self, Report<ConfigurationError>> {
        let mut registry = Self::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "google" => {
                    let provider = GoogleProvider::new(google, callback_base_url, nonces.clone())?;
                    registry.register(Arc::new(provider))?;
                }
                _ => {
                    return Err(ConfigurationError::UnknownProvider {
                        name: name.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(registry)
    }

    /// Adds a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateProvider`] if a provider with
    /// the same code is already registered.
    pub fn register(
        &mut self,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<(), Report<ConfigurationError>> {
        if self.find(provider.code()).is_some() {
            return Err(ConfigurationError::DuplicateProvider {
                code: provider.code().to_string(),
            }
            .into());
        }
        tracing::info!(
            provider = %provider.code(),
            version = %provider.version(),
            "identity provider registered"
        );
        self.providers.push(provider);
        Ok(())
    }

    /// Looks up a provider by its code.
    #[must_use]
    pub fn find(&self, code: &str) -> Option<&Arc<dyn IdentityProvider>> {
        self.providers.iter().find(|p| p.code() == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn IdentityProvider>> {
        self.providers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google_config() -> GoogleConfig {
        GoogleConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            ..GoogleConfig::default()
        }
    }

    fn registry(names: &str) -> Result<ProviderRegistry, Report<ConfigurationError>> {
        ProviderRegistry::from_names(
            names,
            &google_config(),
            "http://localhost:3000",
            Arc::new(NonceStore::default()),
        )
    }

    #[test]
    fn from_names_builds_google() {
        let registry = registry("Google").expect("registry");
        assert_eq!(registry.len(), 1);
        let google = registry.find("google").expect("google provider");
        assert_eq!(google.name(), "Google");
        assert_eq!(google.version(), &Version::new(0, 1, 0));
    }

    #[test]
    fn from_names_rejects_unknown_provider() {
        let err = registry("Google, GitHub").expect_err("unknown provider");
        assert_eq!(
            err.current_context(),
            &ConfigurationError::UnknownProvider {
                name: "GitHub".to_string()
            }
        );
    }

    #[test]
    fn from_names_rejects_duplicates() {
        let err = registry("google,GOOGLE").expect_err("duplicate");
        assert!(matches!(
            err.current_context(),
            ConfigurationError::DuplicateProvider { .. }
        ));
    }

    #[test]
    fn from_names_skips_blank_entries() {
        assert!(registry("").expect("registry").is_empty());
        assert_eq!(registry(" google , ").expect("registry").len(), 1);
    }

    #[test]
    fn find_unknown_code_is_none() {
        let registry = registry("google").expect("registry");
        assert!(registry.find("facebook").is_none());
        assert!(registry.find("Google").is_none());
    }

    #[tokio::test]
    async fn callback_request_deadline_is_in_the_future() {
        let request = CallbackRequest::new(http::Method::GET, "s", "c", Duration::from_secs(5));
        assert!(request.deadline > Instant::now());
    }
}
