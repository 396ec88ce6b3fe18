//! Authentication for the server.
//!
//! - [`resolver`] turns request credentials into an identity
//! - [`middleware`] gates handlers on the identity's roles
//! - [`routes`] drives the provider login flow and issues sessions
//!
//! Roles are fixed when a session is issued. Role changes take effect on the
//! next login.

pub mod middleware;
pub mod resolver;
pub mod routes;

pub use middleware::{Adapter, adapt, notify, require_authenticated, require_roles};
pub use resolver::IdentityResolver;
pub use routes::{AuthError, callback, login, logout};
