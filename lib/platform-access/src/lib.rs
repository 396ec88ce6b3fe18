//! Authentication and access control for wraith.
//!
//! This crate provides:
//! - Single-use login nonces (`NonceStore`)
//! - The identity provider contract and the Google provider
//! - Roles, per-request identities and token verification
//! - In-memory sessions issued after a successful login
//!
//! # Access Control Model
//!
//! Anonymous callers hold the `guest` role. A token that verifies grants
//! `authenticated`, and addresses on the admin list also grant `admin`.
//! Role checks require every listed role.
//!
//! # Example
//!
//! ```
//! use wraith_platform_access::{NonceStore, Role, RoleSet, SessionStore};
//!
//! let nonces = NonceStore::default();
//! let nonce = nonces.create().expect("random source");
//! assert!(nonces.lookup(nonce.as_str()));
//! assert!(!nonces.lookup(nonce.as_str()));
//!
//! let sessions = SessionStore::default();
//! let roles = RoleSet::from_email("root@example.com", true, &["root@example.com".to_string()]);
//! let session = sessions.issue("1234", "root@example.com", roles).expect("random source");
//! let identity = session.identity();
//! assert!(identity.has_roles(&[Role::Authenticated, Role::Admin]));
//! ```

pub mod error;
pub mod google;
pub mod identity;
pub mod nonce;
pub mod provider;
pub mod role;
pub mod session;
pub mod token;

// Re-export main types at crate root
pub use error::{ConfigurationError, ProviderError, RandomSourceError};
pub use google::{GoogleConfig, GoogleProvider};
pub use identity::{AcceptAnyToken, Identity, TokenVerifier};
pub use nonce::{Nonce, NonceStore};
pub use provider::{Authentication, CallbackRequest, IdentityProvider, ProviderRegistry};
pub use role::{Role, RoleSet};
pub use session::{Session, SessionId, SessionStore};
