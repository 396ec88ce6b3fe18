//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `RandomSourceError`: the operating system could not supply random bytes
//! - `ProviderError`: failures during the OAuth2 login and callback flow
//! - `ConfigurationError`: provider setup failures, fatal at startup
//!
//! The enums name what failed. The underlying `oauth2`, `reqwest` or
//! `serde_json` error travels as the child of the `Report`.

use std::fmt;

/// The random source failed while minting a token.
///
/// Nonces and session tokens are never produced from a weaker generator,
/// so this is surfaced to the caller instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSourceError {
    pub reason: String,
}

impl fmt::Display for RandomSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "random source failed: {}", self.reason)
    }
}

impl std::error::Error for RandomSourceError {}

/// Errors from an identity provider's login or callback handling.
///
/// None of these are retried: an authorization code is single use, so the
/// caller restarts the flow from the login URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// A nonce could not be minted for the login URL.
    NonceCreation,
    /// The callback arrived with the wrong HTTP method.
    MethodNotAllowed { method: String },
    /// The callback `state` was unknown, expired, or already used.
    InvalidNonce,
    /// Exchanging the authorization code for an access token failed.
    ExchangeCodeFailed,
    /// Requesting the user-info endpoint failed.
    FetchUserFailed,
    /// Reading the user-info response body failed.
    ReadingResponseFailed,
    /// The user-info response was not the expected shape.
    DecodingResponseFailed,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonceCreation => write!(f, "nonce creation failed"),
            Self::MethodNotAllowed { method } => write!(f, "method not allowed: {method}"),
            Self::InvalidNonce => write!(f, "invalid nonce"),
            Self::ExchangeCodeFailed => write!(f, "exchange-code failed"),
            Self::FetchUserFailed => write!(f, "fetch-user failed"),
            Self::ReadingResponseFailed => write!(f, "reading response failed"),
            Self::DecodingResponseFailed => write!(f, "decoding response failed"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors while building the configured provider set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The operator named a provider this build does not implement.
    UnknownProvider { name: String },
    /// The same provider was configured twice.
    DuplicateProvider { code: String },
    /// A configured endpoint or redirect URL does not parse.
    InvalidUrl { field: &'static str },
    /// The outbound HTTP client could not be constructed.
    HttpClient,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider { name } => write!(f, "provider: {name:?}: unknown provider"),
            Self::DuplicateProvider { code } => {
                write!(f, "provider: {code:?}: configured more than once")
            }
            Self::InvalidUrl { field } => write!(f, "invalid {field}"),
            Self::HttpClient => write!(f, "failed to create HTTP client"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause::prelude::Report;

    #[test]
    fn invalid_nonce_display() {
        assert_eq!(ProviderError::InvalidNonce.to_string(), "invalid nonce");
    }

    #[test]
    fn unknown_provider_display_names_provider() {
        let err = ConfigurationError::UnknownProvider {
            name: "GitHub".to_string(),
        };
        assert!(err.to_string().contains("GitHub"));
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn random_source_error_display() {
        let err = RandomSourceError {
            reason: "entropy pool unavailable".to_string(),
        };
        assert!(err.to_string().contains("entropy pool unavailable"));
    }

    #[test]
    fn report_keeps_cause_under_context() {
        let cause = RandomSourceError {
            reason: "entropy pool unavailable".to_string(),
        };
        let report: Report<ProviderError> = Report::new(cause).context(ProviderError::NonceCreation);

        assert_eq!(report.current_context(), &ProviderError::NonceCreation);
        let rendered = format!("{report:?}");
        assert!(rendered.contains("nonce creation failed"));
        assert!(rendered.contains("entropy pool unavailable"));
    }
}
