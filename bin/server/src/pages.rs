//! Page handlers.

use axum::body::Body;
use axum::response::{IntoResponse, Redirect, Response};
use http::{Method, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use wraith_platform_access::Role;

use crate::app::AppState;
use crate::render::escape;
use crate::router::RequestContext;

/// Home page: a greeting, plus one login button per provider for guests.
pub async fn index(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let identity = &ctx.identity;
    let body = if identity.is_authenticated() {
        format!(
            "<p>Welcome back, <a href=\"/users/{handle}\">{handle}</a>.</p>",
            handle = escape(identity.handle())
        )
    } else {
        let buttons: String = state
            .providers
            .iter()
            .map(|provider| {
                format!(
                    "<form method=\"post\" action=\"/auth/login\">\
                     <input type=\"hidden\" name=\"provider\" value=\"{code}\">\
                     <button type=\"submit\">Log in with {name}</button>\
                     </form>\n",
                    code = escape(provider.code()),
                    name = escape(provider.name()),
                )
            })
            .collect();
        if buttons.is_empty() {
            "<p>No identity providers are configured.</p>".to_string()
        } else {
            buttons
        }
    };
    state
        .renderer
        .page(StatusCode::OK, "Welcome", identity, &body)
}

/// `/index.html` is an alias for `/`.
pub async fn index_html(_state: Arc<AppState>, _ctx: RequestContext) -> Response {
    Redirect::temporary("/").into_response()
}

/// Reports the application and provider versions.
pub async fn version(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let mut body = format!("<p>Wraith {}</p>\n<ul>\n", state.renderer.version());
    for provider in state.providers.iter() {
        body.push_str(&format!(
            "<li>{} {}</li>\n",
            escape(provider.name()),
            provider.version()
        ));
    }
    body.push_str("</ul>");
    state
        .renderer
        .page(StatusCode::OK, "Version", &ctx.identity, &body)
}

/// The profile page for `/users/{id}`. Only reachable when authenticated.
pub async fn user(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let id = ctx.params.get_str("id").unwrap_or_default();
    let identity = &ctx.identity;
    let mut body = format!("<p>User <code>{}</code>.</p>\n", escape(id));
    if identity.handle() == id {
        body.push_str("<p>This is you.</p>\n");
    }
    let roles: Vec<&str> = identity.roles().roles().iter().map(Role::as_str).collect();
    body.push_str(&format!(
        "<p>Signed in as {} with roles: {}.</p>",
        escape(identity.handle()),
        roles.join(", ")
    ));
    state.renderer.page(StatusCode::OK, "User", identity, &body)
}

/// Administrative summary. Only reachable by admins.
pub async fn admin(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let body = format!(
        "<ul>\n\
         <li>Providers: {}</li>\n\
         <li>Outstanding login nonces: {}</li>\n\
         <li>Active sessions: {}</li>\n\
         </ul>",
        state.providers.len(),
        state.nonces.len(),
        state.sessions.len(),
    );
    state
        .renderer
        .page(StatusCode::OK, "Administration", &ctx.identity, &body)
}

/// Renders the not-found page for the request.
pub async fn not_found_page(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let request = &ctx.request;
    state.renderer.not_found(
        &ctx.identity,
        request.method().as_str(),
        request.uri().path(),
    )
}

/// Renders the internal-error page for the request.
pub async fn internal_error_page(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let request = &ctx.request;
    state.renderer.internal_error(
        &ctx.identity,
        request.method().as_str(),
        request.uri().path(),
    )
}

/// Fallback for unmatched requests.
///
/// A `GET` is first tried against the static asset root, if one is
/// configured. In SPA mode a `GET` for a missing file is answered with the
/// root's `index.html`. Everything else gets the not-found page.
pub async fn fallback(state: Arc<AppState>, ctx: RequestContext) -> Response {
    let RequestContext {
        request, identity, ..
    } = ctx;
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if method == Method::GET
        && let Some(root) = &state.config.assets.root
    {
        let served = if state.config.assets.spa {
            ServeDir::new(root)
                .fallback(ServeFile::new(root.join("index.html")))
                .oneshot(request)
                .await
        } else {
            ServeDir::new(root).oneshot(request).await
        };
        match served {
            Ok(response) if response.status() != StatusCode::NOT_FOUND => {
                return response.map(Body::new);
            }
            Ok(_) => {}
            Err(never) => match never {},
        }
    }

    state.renderer.not_found(&identity, method.as_str(), &path)
}
