//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional `wraith.{toml,json,yaml}`
//! file in the working directory, then the file named by `WRAITH_CONFIG` if
//! set, then from environment variables prefixed `WRAITH_` with `__`
//! separating nested keys:
//!
//! ```text
//! WRAITH_CONFIG=/etc/wraith/wraith.toml
//! WRAITH_SERVER__PORT=8080
//! WRAITH_SERVER__TIMEOUT__REQUEST_SECONDS=60
//! WRAITH_AUTH__PROVIDERS=Google
//! WRAITH_GOOGLE__CLIENT_ID=...
//! WRAITH_GOOGLE__CLIENT_SECRET=...
//! ```
//!
//! See [`GoogleConfig`] for the provider settings.

use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wraith_platform_access::GoogleConfig;

/// Environment variable naming an extra configuration file.
pub const CONFIG_FILE_VAR: &str = "WRAITH_CONFIG";

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Google OAuth configuration.
    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub assets: AssetsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub timeout: TimeoutConfig,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    1_048_576
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: TimeoutConfig::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl HttpConfig {
    /// Returns the `host:port` pair to bind.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

}

/// Server and provider timeouts, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Time allowed to receive a request body.
    #[serde(default = "default_read_seconds")]
    pub read_seconds: u64,

    /// Time allowed for a whole request, after which the client gets a 408.
    #[serde(default = "default_request_seconds")]
    pub request_seconds: u64,

    /// Deadline for the provider round trips made while handling a callback.
    #[serde(default = "default_provider_seconds")]
    pub provider_seconds: u64,
}

fn default_read_seconds() -> u64 {
    5
}

fn default_request_seconds() -> u64 {
    60
}

fn default_provider_seconds() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_seconds: default_read_seconds(),
            request_seconds: default_request_seconds(),
            provider_seconds: default_provider_seconds(),
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn read(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.read_seconds)
    }

    #[must_use]
    pub fn request(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_seconds)
    }

    #[must_use]
    pub fn provider(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.provider_seconds)
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Comma-separated provider names, e.g. `Google`.
    #[serde(default = "default_providers")]
    pub providers: String,

    /// Name of the cookie carrying the session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_nonce_ttl_seconds")]
    pub nonce_ttl_seconds: i64,

    #[serde(default = "default_nonce_sweep_interval_seconds")]
    pub nonce_sweep_interval_seconds: i64,

    #[serde(default = "default_session_duration_minutes")]
    pub session_duration_minutes: i64,

    /// Interval between background purges of expired nonces and sessions.
    #[serde(default = "default_purge_interval_seconds")]
    pub purge_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Scheme, host and port that providers redirect back to.
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,

    /// Comma-separated e-mail addresses granted the admin role.
    #[serde(default)]
    pub admin_emails: String,

    /// Trust every non-empty token as an admin. Local development only.
    #[serde(default)]
    pub accept_any_token: bool,
}

fn default_providers() -> String {
    "Google".to_string()
}

fn default_cookie_name() -> String {
    "wraith-session".to_string()
}

fn default_nonce_ttl_seconds() -> i64 {
    300
}

fn default_nonce_sweep_interval_seconds() -> i64 {
    900
}

fn default_session_duration_minutes() -> i64 {
    480
}

fn default_purge_interval_seconds() -> u64 {
    60
}

fn default_secure_cookies() -> bool {
    true
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            cookie_name: default_cookie_name(),
            nonce_ttl_seconds: default_nonce_ttl_seconds(),
            nonce_sweep_interval_seconds: default_nonce_sweep_interval_seconds(),
            session_duration_minutes: default_session_duration_minutes(),
            purge_interval_seconds: default_purge_interval_seconds(),
            secure_cookies: default_secure_cookies(),
            callback_base_url: default_callback_base_url(),
            admin_emails: String::new(),
            accept_any_token: false,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn nonce_ttl(&self) -> Duration {
        Duration::seconds(self.nonce_ttl_seconds)
    }

    #[must_use]
    pub fn nonce_sweep_interval(&self) -> Duration {
        Duration::seconds(self.nonce_sweep_interval_seconds)
    }

    #[must_use]
    pub fn session_duration(&self) -> Duration {
        Duration::minutes(self.session_duration_minutes)
    }

    #[must_use]
    pub fn purge_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.purge_interval_seconds.max(1))
    }

    /// Returns the admin list, trimmed, with blanks removed.
    #[must_use]
    pub fn admin_emails(&self) -> Vec<String> {
        self.admin_emails
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsConfig {
    /// Directory served for GET requests that match no route.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Serve `index.html` from the root for GETs that match neither a route
    /// nor a file, so a single-page app can route on the client.
    #[serde(default)]
    pub spa: bool,
}

impl ServerConfig {
    /// Loads configuration from `wraith.*` (if present), the file named by
    /// `WRAITH_CONFIG` (if set) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed, the `WRAITH_CONFIG` file is
    /// missing, or a value has the wrong type.
    pub fn load() -> Result<Self, config::ConfigError> {
        match std::env::var_os(CONFIG_FILE_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Self::build(None),
        }
    }

    /// Loads configuration from the given file, then the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or a value has
    /// the wrong type.
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        Self::build(Some(path))
    }

    fn build(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("wraith").required(false));
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix("WRAITH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
