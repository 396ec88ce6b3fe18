//! Authentication routes for login, callback, and logout.

use axum::Form;
use axum::extract::{FromRequest, Query};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use http::StatusCode;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use time::Duration as TimeDuration;
use wraith_platform_access::{CallbackRequest, Identity, ProviderError, RoleSet, SessionId};

use super::resolver::credential;
use crate::app::AppState;
use crate::render::escape;
use crate::router::RequestContext;

/// Form posted to start a login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    provider: String,
}

/// Query parameters on the provider callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    state: String,
    #[serde(default)]
    code: String,
}

/// Starts a login by redirecting to the chosen provider.
///
/// The `provider` form value is matched case-insensitively against the
/// configured provider codes.
pub async fn login(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let RequestContext {
        request, identity, ..
    } = ctx;
    let path = request.uri().path().to_string();

    let form = match Form::<LoginForm>::from_request(request, &()).await {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let report = Report::from(AuthError::InvalidForm {
                reason: rejection.body_text(),
            });
            return render(report, &state, &identity, "POST", &path);
        }
    };

    let code = form.provider.to_lowercase();
    let Some(provider) = state.providers.find(&code) else {
        let report = Report::from(AuthError::UnknownProvider { code });
        return render(report, &state, &identity, "POST", &path);
    };

    match provider.login_url() {
        Ok(url) => {
            tracing::info!(provider = %code, "login started");
            Redirect::to(&url).into_response()
        }
        Err(report) => render(
            AuthError::provider(code, report),
            &state,
            &identity,
            "POST",
            &path,
        ),
    }
}

/// Completes a login: validates the callback, starts a session, sets the
/// session cookie and redirects to the user's page.
pub async fn callback(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let RequestContext {
        request,
        params,
        identity,
    } = ctx;
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = Query::<CallbackQuery>::try_from_uri(request.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();
    drop(request);

    let code = params.get_str("provider").unwrap_or_default().to_string();
    let Some(provider) = state.providers.find(&code) else {
        let report = Report::from(AuthError::UnknownProvider { code });
        return render(report, &state, &identity, method.as_str(), &path);
    };

    let callback = CallbackRequest::new(
        method.clone(),
        query.state,
        query.code,
        state.config.server.timeout.provider(),
    );
    let auth = match provider.process_callback(&callback).await {
        Ok(auth) => auth,
        Err(report) => {
            return render(
                AuthError::provider(code, report),
                &state,
                &identity,
                method.as_str(),
                &path,
            );
        }
    };

    let roles = RoleSet::from_email(
        &auth.email,
        auth.verified_email,
        &state.config.auth.admin_emails(),
    );
    let session = match state.sessions.issue(auth.id.clone(), auth.email.clone(), roles) {
        Ok(session) => session,
        Err(report) => {
            let report = report.context(AuthError::Session);
            return render(report, &state, &identity, method.as_str(), &path);
        }
    };

    let session_cookie = Cookie::build((
        state.resolver.cookie_name().to_string(),
        session.id().as_str().to_string(),
    ))
    .path("/")
    .http_only(true)
    .secure(state.config.auth.secure_cookies)
    .same_site(SameSite::Lax)
    .max_age(TimeDuration::minutes(
        state.config.auth.session_duration_minutes,
    ));

    tracing::info!(provider = %code, user = %auth.id, "login completed");
    (
        CookieJar::new().add(session_cookie),
        Redirect::to(&format!("/users/{}", auth.id)),
    )
        .into_response()
}

/// Ends the caller's session and clears the session cookie.
pub async fn logout(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let headers = ctx.request.headers();
    if let Some(token) = credential(headers, state.resolver.cookie_name()) {
        state.sessions.revoke(&SessionId::from(token.as_str()));
    }

    let remove_session = Cookie::build((state.resolver.cookie_name().to_string(), ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (
        CookieJar::from_headers(headers).add(remove_session),
        Redirect::to("/"),
    )
        .into_response()
}

/// Authentication errors, each mapped to one response status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidForm { reason: String },
    UnknownProvider { code: String },
    /// The provider failed; `kind` mirrors the provider report's context.
    Provider { code: String, kind: ProviderError },
    /// No session could be started.
    Session,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidForm { reason } => write!(f, "invalid login form: {}", reason),
            Self::UnknownProvider { code } => write!(f, "unknown provider '{}'", code),
            Self::Provider { code, .. } => write!(f, "provider '{}' failed", code),
            Self::Session => write!(f, "failed to start session"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    /// Layers the provider's report under an [`AuthError::Provider`].
    #[must_use]
    pub fn provider(code: String, report: Report<ProviderError>) -> Report<AuthError> {
        let kind = report.current_context().clone();
        report.context(AuthError::Provider { code, kind })
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidForm { .. } => StatusCode::BAD_REQUEST,
            Self::UnknownProvider { .. } => StatusCode::NOT_FOUND,
            Self::Provider { kind, .. } => match kind {
                ProviderError::InvalidNonce => StatusCode::BAD_REQUEST,
                ProviderError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Session => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Logs the report and renders a user-safe page.
fn render(
    report: Report<AuthError>,
    state: &AppState,
    identity: &Identity,
    method: &str,
    path: &str,
) -> Response {
    let status = report.current_context().status();
    let renderer = &state.renderer;
    match status {
        StatusCode::NOT_FOUND => {
            tracing::debug!(error = %report, %method, %path, "auth route not found");
            renderer.not_found(identity, method, path)
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            tracing::error!(error = %report, %method, %path, "authentication failed");
            renderer.internal_error(identity, method, path)
        }
        StatusCode::METHOD_NOT_ALLOWED => {
            tracing::warn!(error = %report, %method, %path, "authentication rejected");
            let body = format!("<p>{} is not allowed on {}.</p>", escape(method), escape(path));
            renderer.page(status, "Method Not Allowed", identity, &body)
        }
        _ => {
            tracing::warn!(error = %report, %method, %path, "authentication rejected");
            renderer.page(
                status,
                "Login Failed",
                identity,
                "<p>This login link has expired or was already used. <a href=\"/\">Log in again</a>.</p>",
            )
        }
    }
}
