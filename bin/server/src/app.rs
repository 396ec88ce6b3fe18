//! Application state and route table.
//!
//! Every request is resolved to an [`Identity`](wraith_platform_access::Identity)
//! once, then dispatched through the [`Router`]. Protected routes wrap their
//! handler with access adapters; a caller without the required roles gets the
//! not-found page.

use axum::extract::Request;
use http::StatusCode;
use rootcause::prelude::Report;
use std::future::Future;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;
use wraith_core::Version;
use wraith_platform_access::{
    AcceptAnyToken, NonceStore, ProviderRegistry, Role, SessionStore, TokenVerifier,
};

use crate::auth::{self, IdentityResolver, adapt, notify, require_authenticated, require_roles};
use crate::config::ServerConfig;
use crate::error::{RouteError, StartupError};
use crate::pages;
use crate::render::Renderer;
use crate::router::{Handler, RequestContext, Router, handler};

/// Version reported in the `Wraith-Version` header and on `/version`.
pub const APP_VERSION: Version = Version::new(0, 1, 0);

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub renderer: Renderer,
    pub providers: ProviderRegistry,
    pub nonces: Arc<NonceStore>,
    pub sessions: Arc<SessionStore>,
    pub resolver: IdentityResolver,
}

impl AppState {
    /// Builds the stores, providers and resolver described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured provider is unknown or cannot be
    /// constructed.
    pub fn from_config(config: ServerConfig) -> Result<Self, Report<StartupError>> {
        let nonces = Arc::new(
            NonceStore::new(config.auth.nonce_ttl())
                .with_sweep_interval(config.auth.nonce_sweep_interval()),
        );
        let providers = ProviderRegistry::from_names(
            &config.auth.providers,
            &config.google,
            &config.auth.callback_base_url,
            nonces.clone(),
        )
        .map_err(|report| report.context(StartupError::Providers))?;
        let sessions = Arc::new(SessionStore::new(config.auth.session_duration()));

        let verifier: Arc<dyn TokenVerifier> = if config.auth.accept_any_token {
            tracing::warn!("auth.accept_any_token is set: every bearer token is treated as an admin");
            Arc::new(AcceptAnyToken)
        } else {
            sessions.clone()
        };
        let resolver = IdentityResolver::new(config.auth.cookie_name.clone(), verifier);

        Ok(Self {
            config,
            renderer: Renderer::new(APP_VERSION),
            providers,
            nonces,
            sessions,
            resolver,
        })
    }
}

/// Binds a page handler to the application state.
pub fn with_state<F, Fut>(state: &Arc<AppState>, f: F) -> Handler
where
    F: Fn(Arc<AppState>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = axum::response::Response> + Send + 'static,
{
    let state = state.clone();
    handler(move |ctx| f(state.clone(), ctx))
}

/// Builds the route table.
///
/// # Errors
///
/// Returns an error if a pattern is malformed or registered twice.
pub fn routes(state: &Arc<AppState>) -> Result<Router, Report<RouteError>> {
    let not_found = with_state(state, pages::not_found_page);
    let authenticated = require_authenticated(not_found.clone());
    let admin = require_roles(&[Role::Authenticated, Role::Admin], not_found);
    let log = notify();

    Router::new(with_state(state, pages::fallback))
        .get("/", with_state(state, pages::index))?
        .get("/index.html", with_state(state, pages::index_html))?
        .get("/version", with_state(state, pages::version))?
        .get("/notFound", with_state(state, pages::not_found_page))?
        .get(
            "/internalServerError",
            with_state(state, pages::internal_error_page),
        )?
        .post("/auth/login", with_state(state, auth::login))?
        .get(
            "/auth/callback/{provider:string}",
            with_state(state, auth::callback),
        )?
        // Lets the provider reject a POST callback itself.
        .post(
            "/auth/callback/{provider:string}",
            with_state(state, auth::callback),
        )?
        .get("/auth/logout", with_state(state, auth::logout))?
        .get(
            "/users/{id:string}",
            adapt(
                with_state(state, pages::user),
                &[log.clone(), authenticated.clone()],
            ),
        )?
        .get(
            "/admin",
            adapt(
                with_state(state, pages::admin),
                &[log, authenticated, admin],
            ),
        )
}

/// Builds the HTTP service: identity resolution, routing, request limits and
/// request tracing.
///
/// A request body larger than `server.max_body_bytes` gets a 413. A body that
/// takes longer than `server.timeout.read_seconds` to arrive fails to read,
/// and a request still running after `server.timeout.request_seconds` gets a
/// 408.
///
/// # Errors
///
/// Returns an error if the route table cannot be built.
pub fn service(state: Arc<AppState>) -> Result<axum::Router, Report<RouteError>> {
    let router = Arc::new(routes(&state)?);
    let server = state.config.server.clone();
    let app = axum::Router::new()
        .fallback(move |request: Request| {
            let router = router.clone();
            let state = state.clone();
            async move {
                let headers = request.headers().clone();
                let identity = state.resolver.resolve(&headers).await;
                router.dispatch(request, identity).await
            }
        })
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(RequestBodyTimeoutLayer::new(server.timeout.read()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            server.timeout.request(),
        ))
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

/// Periodically drops expired nonces and sessions.
pub fn spawn_purge_task(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.auth.purge_interval());
        loop {
            interval.tick().await;
            let nonces = state.nonces.purge_expired();
            let sessions = state.sessions.purge_expired();
            if nonces > 0 || sessions > 0 {
                tracing::debug!(
                    expired_nonces = nonces,
                    expired_sessions = sessions,
                    "periodic purge"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.google.client_id = "client-id".to_string();
        config.google.client_secret = "client-secret".to_string();
        config
    }

    #[test]
    fn from_config_registers_google() {
        let state = AppState::from_config(config()).expect("state");
        assert_eq!(state.providers.len(), 1);
        assert!(state.providers.find("google").is_some());
        assert_eq!(state.resolver.cookie_name(), "wraith-session");
        assert_eq!(state.renderer.version(), &APP_VERSION);
    }

    #[test]
    fn from_config_rejects_unknown_provider() {
        let mut config = config();
        config.auth.providers = "Google, Myspace".to_string();
        let err = AppState::from_config(config).expect_err("unknown provider");
        assert_eq!(err.current_context(), &StartupError::Providers);
        assert!(format!("{err:?}").contains("Myspace"));
    }

    #[test]
    fn route_table_builds() {
        let state = Arc::new(AppState::from_config(config()).expect("state"));
        let router = routes(&state).expect("routes");
        assert_eq!(router.len(), 11);
    }
}
