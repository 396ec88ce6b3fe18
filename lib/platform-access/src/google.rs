//! Google as an identity provider.
//!
//! Uses the OAuth2 authorization-code flow with the `userinfo.email` and
//! `userinfo.profile` scopes, then reads the profile from the v2 user-info
//! endpoint with the access token.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::Url;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::time::timeout_at;
use wraith_core::Version;

use crate::error::{ConfigurationError, ProviderError};
use crate::nonce::NonceStore;
use crate::provider::{Authentication, CallbackRequest, IdentityProvider};

/// Google OAuth authorization URL.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth token URL.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google user-info URL.
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested at login, comma separated.
pub const GOOGLE_SCOPES: &str =
    "https://www.googleapis.com/auth/userinfo.email,https://www.googleapis.com/auth/userinfo.profile";

/// Path, relative to the callback base URL, that Google redirects back to.
pub const GOOGLE_CALLBACK_PATH: &str = "/auth/callback/google";

static PROVIDER_VERSION: Version = Version::new(0, 1, 0);

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Google OAuth configuration.
///
/// Endpoint overrides exist so tests and proxies can stand in for Google.
#[derive(Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Full callback URL; derived from the callback base URL when unset.
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
}

fn default_auth_url() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_userinfo_url() -> String {
    GOOGLE_USERINFO_URL.to_string()
}

fn default_scopes() -> String {
    GOOGLE_SCOPES.to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: None,
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            scopes: default_scopes(),
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Profile returned by the v2 user-info endpoint.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    verified_email: bool,
    #[serde(default)]
    picture: String,
}

impl From<GoogleUserInfo> for Authentication {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            email: info.email,
            verified_email: info.verified_email,
            avatar: info.picture,
        }
    }
}

/// The Google identity provider.
pub struct GoogleProvider {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: Url,
    scopes: Vec<Scope>,
    nonces: Arc<NonceStore>,
    http: reqwest::Client,
}

impl GoogleProvider {
    /// Creates the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured URL does not parse or the HTTP client
    /// cannot be built.
    pub fn new(
        config: &GoogleConfig,
        callback_base_url: &str,
        nonces: Arc<NonceStore>,
    ) -> Result<Self, Report<ConfigurationError>> {
        let invalid = |field: &'static str| {
            move |e: oauth2::url::ParseError| {
                Report::new(e).context(ConfigurationError::InvalidUrl { field })
            }
        };

        let redirect = config.redirect_url.clone().unwrap_or_else(|| {
            format!(
                "{}{GOOGLE_CALLBACK_PATH}",
                callback_base_url.trim_end_matches('/')
            )
        });

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Report::new(e).context(ConfigurationError::HttpClient))?;

        Ok(Self {
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            auth_url: AuthUrl::new(config.auth_url.clone()).map_err(invalid("google.auth_url"))?,
            token_url: TokenUrl::new(config.token_url.clone())
                .map_err(invalid("google.token_url"))?,
            redirect_url: RedirectUrl::new(redirect).map_err(invalid("google.redirect_url"))?,
            userinfo_url: Url::parse(&config.userinfo_url)
                .map_err(invalid("google.userinfo_url"))?,
            scopes: config
                .scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Scope::new(s.to_string()))
                .collect(),
            nonces,
            http,
        })
    }

    /// Returns the callback URL Google redirects to.
    #[must_use]
    pub fn redirect_url(&self) -> &str {
        self.redirect_url.as_str()
    }

    fn client(&self) -> GoogleClient {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }

    async fn fetch_user(
        &self,
        access_token: &str,
        deadline: tokio::time::Instant,
    ) -> Result<GoogleUserInfo, Report<ProviderError>> {
        let request = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send();
        let response = timeout_at(deadline, request)
            .await
            .map_err(|elapsed| Report::new(elapsed).context(ProviderError::FetchUserFailed))?
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Report::new(e).context(ProviderError::FetchUserFailed))?;

        let body = timeout_at(deadline, response.bytes())
            .await
            .map_err(|elapsed| Report::new(elapsed).context(ProviderError::ReadingResponseFailed))?
            .map_err(|e| Report::new(e).context(ProviderError::ReadingResponseFailed))?;

        serde_json::from_slice(&body)
            .map_err(|e| Report::new(e).context(ProviderError::DecodingResponseFailed))
    }
}

/// Google user ids are decimal strings. Anything outside a conservative
/// URL-path alphabet is refused before it reaches a session or a redirect.
fn is_safe_user_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

impl fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("client_id", &self.client_id.as_str())
            .field("redirect_url", &self.redirect_url.as_str())
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "Google"
    }

    fn code(&self) -> &str {
        "google"
    }

    fn version(&self) -> &Version {
        &PROVIDER_VERSION
    }

    fn login_url(&self) -> Result<String, Report<ProviderError>> {
        let nonce = self
            .nonces
            .create()
            .map_err(|report| report.context(ProviderError::NonceCreation))?;
        let state = nonce.into_string();

        let client = self.client();
        let (url, _state) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned())
            .url();
        tracing::debug!(provider = "google", "login URL issued");
        Ok(url.to_string())
    }

    async fn process_callback(
        &self,
        request: &CallbackRequest,
    ) -> Result<Authentication, Report<ProviderError>> {
        if request.method != http::Method::GET {
            return Err(ProviderError::MethodNotAllowed {
                method: request.method.to_string(),
            }
            .into());
        }

        if !self.nonces.lookup(&request.state) {
            tracing::warn!(provider = "google", "callback rejected: invalid nonce");
            return Err(ProviderError::InvalidNonce.into());
        }

        let client = self.client();
        let exchange = client
            .exchange_code(AuthorizationCode::new(request.code.clone()))
            .request_async(&self.http);
        let token = timeout_at(request.deadline, exchange)
            .await
            .map_err(|elapsed| Report::new(elapsed).context(ProviderError::ExchangeCodeFailed))?
            .map_err(|e| Report::new(e).context(ProviderError::ExchangeCodeFailed))?;

        let info = self
            .fetch_user(token.access_token().secret(), request.deadline)
            .await?;
        if !is_safe_user_id(&info.id) {
            tracing::warn!(
                provider = "google",
                user = ?info.id,
                "callback rejected: unusable user id"
            );
            return Err(ProviderError::DecodingResponseFailed.into());
        }
        tracing::info!(
            provider = "google",
            user = %info.id,
            verified = info.verified_email,
            "callback processed"
        );
        Ok(info.into())
    }
}
