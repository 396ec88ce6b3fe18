//! Role types for access control.
//!
//! Every request resolves to a set of roles. Anonymous callers hold `guest`;
//! a verified credential grants `authenticated`, and addresses on the admin
//! list additionally grant `admin`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A capability tag attached to a resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Anonymous caller with no verified credential.
    Guest,
    /// Caller presented a credential that verified.
    Authenticated,
    /// Authenticated caller with oversight capabilities.
    Admin,
}

impl Role {
    /// Returns the lowercase name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Authenticated => "authenticated",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of roles held by an identity.
///
/// Having `Admin` always implies having `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    roles: Vec<Role>,
}

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn none() -> Self {
        Self { roles: Vec::new() }
    }

    /// Creates the role set of an anonymous caller.
    #[must_use]
    pub fn guest() -> Self {
        Self {
            roles: vec![Role::Guest],
        }
    }

    /// Creates a role set with authenticated access only.
    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            roles: vec![Role::Authenticated],
        }
    }

    /// Creates a role set with admin access (implies authenticated access).
    #[must_use]
    pub fn admin() -> Self {
        Self {
            roles: vec![Role::Authenticated, Role::Admin],
        }
    }

    /// Derives roles for a user who completed a provider login.
    ///
    /// Only a verified e-mail on the admin list grants `Admin`; the
    /// comparison ignores ASCII case.
    #[must_use]
    pub fn from_email(email: &str, verified: bool, admin_emails: &[String]) -> Self {
        let listed = admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()));
        if verified && listed {
            Self::admin()
        } else {
            Self::authenticated()
        }
    }

    /// Returns true if the set holds `role`.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns true if the set holds every role in `required`.
    ///
    /// An empty requirement is always satisfied.
    #[must_use]
    pub fn contains_all(&self, required: &[Role]) -> bool {
        required.iter().all(|role| self.contains(*role))
    }

    /// Returns the roles as a slice.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

impl Default for RoleSet {
    fn default() -> Self {
        Self::guest()
    }
}
