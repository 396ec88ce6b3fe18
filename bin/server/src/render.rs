//! HTML rendering.
//!
//! Every rendered page carries the `Wraith-Version` header.

use axum::response::{Html, IntoResponse, Response};
use http::{HeaderName, HeaderValue, StatusCode};
use wraith_core::Version;
use wraith_platform_access::Identity;

/// Response header carrying the application version.
pub static VERSION_HEADER: HeaderName = HeaderName::from_static("wraith-version");

/// Renders pages inside the site layout.
#[derive(Debug, Clone)]
pub struct Renderer {
    version: Version,
}

impl Renderer {
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Renders `body` (already escaped HTML) as a full page.
    #[must_use]
    pub fn page(
        &self,
        status: StatusCode,
        title: &str,
        identity: &Identity,
        body: &str,
    ) -> Response {
        let nav = if identity.is_authenticated() {
            format!(
                r#"<a href="/users/{handle}">{handle}</a> | <a href="/auth/logout">Log out</a>"#,
                handle = escape(identity.handle())
            )
        } else {
            r#"<a href="/">Log in</a>"#.to_string()
        };
        let html = format!(
            "<!DOCTYPE html>\n\
             <html lang=\"en\">\n\
             <head><meta charset=\"utf-8\"><title>{title} - Wraith</title></head>\n\
             <body>\n\
             <nav><a href=\"/\">Wraith</a> | {nav}</nav>\n\
             <main>\n<h1>{title}</h1>\n{body}\n</main>\n\
             <footer>Wraith {version}</footer>\n\
             </body>\n\
             </html>\n",
            title = escape(title),
            version = self.version,
        );

        let mut response = (status, Html(html)).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.version.to_string()) {
            response.headers_mut().insert(VERSION_HEADER.clone(), value);
        }
        response
    }

    /// Renders the not-found page for `method` and `path`.
    #[must_use]
    pub fn not_found(&self, identity: &Identity, method: &str, path: &str) -> Response {
        let body = format!(
            "<p>{} {} was not found.</p>",
            escape(method),
            escape(path)
        );
        self.page(StatusCode::NOT_FOUND, "Not Found", identity, &body)
    }

    /// Renders the generic internal-error page.
    ///
    /// Error detail belongs in the server log, never in the page.
    #[must_use]
    pub fn internal_error(&self, identity: &Identity, method: &str, path: &str) -> Response {
        let body = format!(
            "<p>Something went wrong handling {} {}.</p>",
            escape(method),
            escape(path)
        );
        self.page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            identity,
            &body,
        )
    }
}

/// Escapes text for inclusion in HTML content or attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
