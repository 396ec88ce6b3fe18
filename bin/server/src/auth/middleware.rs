//! Access middleware: adapters that wrap handlers.
//!
//! An [`Adapter`] takes a handler and returns a handler. [`adapt`] applies a
//! list of adapters so that the first one listed runs first:
//!
//! ```text
//! adapt(h, [a, b, c])  ==  a(b(c(h)))   // a checks first, h runs last
//! ```
//!
//! Role failures go to the not-found handler. A caller who lacks access cannot
//! tell a protected route from one that does not exist.

use axum::response::Response;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use wraith_platform_access::Role;

use crate::router::{Handler, RequestContext};

/// Wraps a handler in another handler.
pub type Adapter = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Applies `adapters` to `handler`, first-listed outermost.
#[must_use]
pub fn adapt(handler: Handler, adapters: &[Adapter]) -> Handler {
    adapters
        .iter()
        .rev()
        .fold(handler, |inner, adapter| adapter(inner))
}

/// Lets the request through only if the identity holds `authenticated`.
#[must_use]
pub fn require_authenticated(not_found: Handler) -> Adapter {
    require_roles(&[Role::Authenticated], not_found)
}

/// Lets the request through only if the identity holds every role in `roles`.
#[must_use]
pub fn require_roles(roles: &[Role], not_found: Handler) -> Adapter {
    let roles: Arc<[Role]> = roles.into();
    Arc::new(move |next: Handler| -> Handler {
        let roles = roles.clone();
        let not_found = not_found.clone();
        Arc::new(move |ctx: RequestContext| -> BoxFuture<'static, Response> {
            if ctx.identity.has_roles(&roles) {
                next(ctx)
            } else {
                tracing::debug!(
                    method = %ctx.request.method(),
                    path = %ctx.request.uri().path(),
                    handle = %ctx.identity.handle(),
                    ?roles,
                    "missing roles"
                );
                not_found(ctx)
            }
        })
    })
}

/// Logs before and after the wrapped handler runs.
#[must_use]
pub fn notify() -> Adapter {
    Arc::new(|next: Handler| -> Handler {
        Arc::new(move |ctx: RequestContext| -> BoxFuture<'static, Response> {
            let method = ctx.request.method().clone();
            let path = ctx.request.uri().path().to_string();
            let next = next.clone();
            Box::pin(async move {
                tracing::info!(%method, %path, "before");
                let started = Instant::now();
                let response = next(ctx).await;
                tracing::info!(
                    %method,
                    %path,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "after"
                );
                response
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::handler;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::response::IntoResponse;
    use http::StatusCode;
    use std::sync::Mutex;
    use wraith_platform_access::{Identity, RoleSet};

    fn ok() -> Handler {
        handler(|_ctx| async { (StatusCode::OK, "secret").into_response() })
    }

    fn not_found() -> Handler {
        handler(|_ctx| async { StatusCode::NOT_FOUND.into_response() })
    }

    fn ctx(identity: Identity) -> RequestContext {
        let request = Request::builder()
            .uri("/admin")
            .body(Body::empty())
            .expect("request");
        RequestContext::new(request, identity)
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Adapter {
        let log = log.clone();
        Arc::new(move |next: Handler| -> Handler {
            let log = log.clone();
            Arc::new(move |ctx: RequestContext| -> BoxFuture<'static, Response> {
                log.lock().expect("log").push(label);
                next(ctx)
            })
        })
    }

    #[tokio::test]
    async fn guest_never_reaches_authenticated_handler() {
        let h = adapt(ok(), &[require_authenticated(not_found())]);
        let response = h(ctx(Identity::guest())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn authenticated_user_reaches_handler() {
        let h = adapt(ok(), &[require_authenticated(not_found())]);
        let response = h(ctx(Identity::new("alice", RoleSet::authenticated()))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn require_roles_needs_every_role() {
        let h = adapt(
            ok(),
            &[require_roles(&[Role::Authenticated, Role::Admin], not_found())],
        );

        let user = h(ctx(Identity::new("alice", RoleSet::authenticated()))).await;
        assert_eq!(user.status(), StatusCode::NOT_FOUND);

        let admin = h(ctx(Identity::new("root", RoleSet::admin()))).await;
        assert_eq!(admin.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn adapters_run_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = adapt(
            ok(),
            &[
                recording(&log, "a"),
                recording(&log, "b"),
                recording(&log, "c"),
            ],
        );
        h(ctx(Identity::guest())).await;
        assert_eq!(*log.lock().expect("log"), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn outer_check_short_circuits_inner_adapters() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = adapt(
            ok(),
            &[require_authenticated(not_found()), recording(&log, "inner")],
        );
        let response = h(ctx(Identity::guest())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(log.lock().expect("log").is_empty());
    }

    #[tokio::test]
    async fn notify_passes_response_through() {
        let h = adapt(ok(), &[notify()]);
        let response = h(ctx(Identity::guest())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn adapt_with_no_adapters_is_identity() {
        let h = adapt(ok(), &[]);
        assert_eq!(h(ctx(Identity::guest())).await.status(), StatusCode::OK);
    }
}
