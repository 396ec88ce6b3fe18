//! Method and path routing with typed path captures.
//!
//! Patterns are `/`-separated segments. A segment is either a literal, matched
//! exactly, or a capture written `{name}` or `{name:type}` where type is
//! `string` (the default), `int` or `bool`:
//!
//! ```text
//! /users/{id:int}
//! /auth/callback/{provider}
//! /flags/{name:string}/{enabled:bool}
//! ```
//!
//! Matching strips one leading `/`, splits on `/` and walks the path and the
//! pattern in lockstep. Both must run out together. Paths are not normalized,
//! so `/users/42/` and `/users/42` are different paths. An `int` capture must
//! parse as an `i64` and a `bool` capture must be exactly `true` or `false`.
//! A `string` capture accepts any segment, including an empty one between two
//! slashes, but the empty tail after a trailing `/` means the path has run out
//! and fills no capture: `/users/` does not match `/users/{id}`.
//!
//! Routes are tried in registration order and the first match wins. Anything
//! that matches no route goes to the not-found handler.

use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use http::Method;
use rootcause::prelude::Report;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use wraith_platform_access::Identity;

use crate::error::RouteError;

/// Everything a handler gets for one request.
pub struct RequestContext {
    pub request: Request,
    pub params: Params,
    /// Resolved once, before routing, and never changed afterwards.
    pub identity: Identity,
}

impl RequestContext {
    /// Creates a context with no path captures.
    #[must_use]
    pub fn new(request: Request, identity: Identity) -> Self {
        Self {
            request,
            params: Params::default(),
            identity,
        }
    }
}

/// A request handler.
pub type Handler = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps an async function or closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext| -> BoxFuture<'static, Response> { Box::pin(f(ctx)) })
}

/// The declared type of a path capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    String,
    Integer,
    Boolean,
}

impl CaptureKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" | "str" => Some(Self::String),
            "int" | "integer" => Some(Self::Integer),
            "bool" | "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    fn capture(self, segment: &str) -> Option<ParamValue> {
        match self {
            Self::String => Some(ParamValue::String(segment.to_string())),
            Self::Integer => segment.parse().ok().map(ParamValue::Integer),
            Self::Boolean => match segment {
                "true" => Some(ParamValue::Boolean(true)),
                "false" => Some(ParamValue::Boolean(false)),
                _ => None,
            },
        }
    }
}

/// A value captured from the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

/// Path captures, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParamValue::String(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ParamValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(ParamValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture { name: String, kind: CaptureKind },
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a pattern such as `/users/{id:int}`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidPattern`] for a malformed pattern and
    /// [`RouteError::UnknownCaptureType`] for an unsupported capture type.
    pub fn parse(pattern: &str) -> Result<Self, Report<RouteError>> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for raw in rest.split('/') {
            if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
                let (name, kind) = inner.split_once(':').unwrap_or((inner, "string"));
                let (name, kind) = (name.trim(), kind.trim());
                if name.is_empty() {
                    return Err(invalid("capture has no name").into());
                }
                if names.contains(&name) {
                    return Err(invalid("capture name is repeated").into());
                }
                let kind =
                    CaptureKind::from_name(kind).ok_or_else(|| RouteError::UnknownCaptureType {
                        pattern: pattern.to_string(),
                        kind: kind.to_string(),
                    })?;
                names.push(name);
                segments.push(Segment::Capture {
                    name: name.to_string(),
                    kind,
                });
            } else if raw.contains(['{', '}']) {
                return Err(invalid("unbalanced braces").into());
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches `path`, returning its captures on success.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Params> {
        let rest = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = rest.split('/').collect();
        // path must be consumed in the same step as the pattern
        if parts.len() != self.segments.len() {
            return None;
        }
        let last = parts.len() - 1;
        let mut params = Vec::new();
        for (i, (segment, part)) in self.segments.iter().zip(&parts).enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Capture { name, kind } => {
                    if i == last && part.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), kind.capture(part)?));
                }
            }
        }
        Some(Params(params))
    }

    /// Returns true if both patterns accept exactly the same paths.
    fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Capture { kind: x, .. }, Segment::Capture { kind: y, .. }) => x == y,
                    _ => false,
                })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Routing table, immutable once built.
pub struct Router {
    routes: Vec<Route>,
    not_found: Handler,
}

impl Router {
    /// Creates an empty router that sends every request to `not_found`.
    #[must_use]
    pub fn new(not_found: Handler) -> Self {
        Self {
            routes: Vec::new(),
            not_found,
        }
    }

    /// Registers `handler` for `method` and `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not parse or the same method and
    /// pattern shape is already registered.
    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        handler: Handler,
    ) -> Result<Self, Report<RouteError>> {
        let pattern = Pattern::parse(pattern)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.same_shape(&pattern))
        {
            return Err(RouteError::DuplicateRoute {
                method: method.to_string(),
                pattern: pattern.raw,
            }
            .into());
        }
        tracing::debug!(%method, %pattern, "route registered");
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    /// Registers a GET route.
    ///
    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn get(self, pattern: &str, handler: Handler) -> Result<Self, Report<RouteError>> {
        self.route(Method::GET, pattern, handler)
    }

    /// Registers a POST route.
    ///
    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn post(self, pattern: &str, handler: Handler) -> Result<Self, Report<RouteError>> {
        self.route(Method::POST, pattern, handler)
    }

    /// Returns the not-found handler.
    #[must_use]
    pub fn not_found(&self) -> &Handler {
        &self.not_found
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes a request to the first matching handler.
    pub fn dispatch(&self, request: Request, identity: Identity) -> BoxFuture<'static, Response> {
        let path = request.uri().path().to_string();
        let route = self.routes.iter().find_map(|route| {
            if route.method != *request.method() {
                return None;
            }
            route.pattern.matches(&path).map(|params| (route, params))
        });

        match route {
            Some((route, params)) => (route.handler)(RequestContext {
                request,
                params,
                identity,
            }),
            None => (self.not_found)(RequestContext::new(request, identity)),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.pattern)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;
    use http::StatusCode;
    use http_body_util::BodyExt;

    fn params(pattern: &str, path: &str) -> Option<Params> {
        Pattern::parse(pattern).expect("pattern").matches(path)
    }

    fn labelled(label: &'static str) -> Handler {
        handler(move |ctx: RequestContext| async move {
            let id = ctx
                .params
                .get_int("id")
                .map(|n| n.to_string())
                .unwrap_or_default();
            (StatusCode::OK, format!("{label}{id}")).into_response()
        })
    }

    fn not_found() -> Handler {
        handler(|_ctx| async { StatusCode::NOT_FOUND.into_response() })
    }

    async fn call(router: &Router, method: Method, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .expect("request");
        let response = router.dispatch(request, Identity::guest()).await;
        let status = response.status();
        let body = response.into_body().collect().await.expect("body").to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn integer_capture_matches_number() {
        let p = params("/users/{id:int}", "/users/42").expect("match");
        assert_eq!(p.get_int("id"), Some(42));
        assert_eq!(params("/users/{id:int}", "/users/-7").and_then(|p| p.get_int("id")), Some(-7));
    }

    #[test]
    fn integer_capture_rejects_non_number() {
        assert!(params("/users/{id:int}", "/users/abc").is_none());
        assert!(params("/users/{id:int}", "/users/").is_none());
        assert!(params("/users/{id:int}", "/users/99999999999999999999").is_none());
    }

    #[test]
    fn extra_or_missing_segments_do_not_match() {
        assert!(params("/users/{id:int}", "/users/42/extra").is_none());
        assert!(params("/users/{id:int}", "/users").is_none());
        assert!(params("/users/{id:int}", "/users/42/").is_none());
    }

    #[test]
    fn exhausted_path_fills_no_capture() {
        assert!(params("/users/{id}", "/users/").is_none());
        assert!(params("/users/{id:string}", "/users/").is_none());
        assert!(params("/users/{id:string}", "/users/alice/").is_none());
    }

    #[test]
    fn boolean_capture_accepts_only_true_or_false() {
        let p = params("/flags/{on:bool}", "/flags/true").expect("match");
        assert_eq!(p.get_bool("on"), Some(true));
        assert_eq!(
            params("/flags/{on:bool}", "/flags/false").and_then(|p| p.get_bool("on")),
            Some(false)
        );
        assert!(params("/flags/{on:bool}", "/flags/TRUE").is_none());
        assert!(params("/flags/{on:bool}", "/flags/1").is_none());
    }

    #[test]
    fn string_capture_accepts_any_segment() {
        let p = params("/auth/callback/{provider}", "/auth/callback/google").expect("match");
        assert_eq!(p.get_str("provider"), Some("google"));
        let empty = params("/a/{name:string}/b", "/a//b").expect("match");
        assert_eq!(empty.get_str("name"), Some(""));
        assert!(params("/auth/callback/{provider:string}", "/auth/callback/").is_none());
    }

    #[test]
    fn literals_are_case_sensitive_and_unnormalized() {
        assert!(params("/version", "/version").is_some());
        assert!(params("/version", "/Version").is_none());
        assert!(params("/a/b", "/a/./b").is_none());
        assert!(params("/version", "/version/").is_none());
        assert!(params("/a/b", "/a//b").is_none());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        assert!(params("/", "/").is_some());
        assert!(params("/", "/index.html").is_none());
        assert!(params("/", "//").is_none());
    }

    #[test]
    fn typed_getters_check_type() {
        let p = params("/users/{id:int}", "/users/42").expect("match");
        assert_eq!(p.get_str("id"), None);
        assert_eq!(p.get_int("missing"), None);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn parse_rejects_malformed_patterns() {
        for bad in ["users", "/users/{", "/users/{}", "/users/{:int}", "/a/{x}/{x}", "/a}b"] {
            let err = Pattern::parse(bad).expect_err("invalid");
            assert!(
                matches!(err.current_context(), RouteError::InvalidPattern { .. }),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn parse_rejects_unknown_capture_type() {
        let err = Pattern::parse("/x/{n:float}").expect_err("unknown type");
        assert_eq!(
            err.current_context(),
            &RouteError::UnknownCaptureType {
                pattern: "/x/{n:float}".to_string(),
                kind: "float".to_string()
            }
        );
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let router = Router::new(not_found())
            .get("/users/{id:int}", labelled("a"))
            .expect("first");
        let err = router
            .get("/users/{user:int}", labelled("b"))
            .expect_err("duplicate");
        assert!(matches!(
            err.current_context(),
            RouteError::DuplicateRoute { .. }
        ));
    }

    #[test]
    fn same_pattern_on_other_method_is_allowed() {
        let router = Router::new(not_found())
            .get("/auth/login", labelled("get"))
            .and_then(|r| r.post("/auth/login", labelled("post")))
            .expect("routes");
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn dispatch_extracts_params() {
        let router = Router::new(not_found())
            .get("/users/{id:int}", labelled("user "))
            .expect("route");

        assert_eq!(
            call(&router, Method::GET, "/users/42").await,
            (StatusCode::OK, "user 42".to_string())
        );
        assert_eq!(call(&router, Method::GET, "/users/abc").await.0, StatusCode::NOT_FOUND);
        assert_eq!(call(&router, Method::GET, "/users/42/extra").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_checks_method() {
        let router = Router::new(not_found())
            .get("/version", labelled("version"))
            .expect("route");
        assert_eq!(call(&router, Method::POST, "/version").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn first_registered_route_wins_on_overlap() {
        let router = Router::new(not_found())
            .get("/users/me", labelled("me"))
            .and_then(|r| r.get("/users/{name}", labelled("name")))
            .expect("routes");
        assert_eq!(call(&router, Method::GET, "/users/me").await.1, "me");
        assert_eq!(call(&router, Method::GET, "/users/alice").await.1, "name");
    }
}
