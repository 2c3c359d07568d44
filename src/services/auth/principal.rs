/*
 * Responsibility
 * - The authenticated identity attached to a request (Principal)
 * - The request-scoped context that is either anonymous or authenticated (Identity)
 * - Role vocabulary shared by the route table and the user directory
 */
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::services::auth::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts `ADMIN`, `admin` and the `ROLE_ADMIN` form stored by older rows.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("ROLE_"))
            .map_or(trimmed, |_| &trimmed[5..]);

        if name.eq_ignore_ascii_case("USER") {
            Ok(Role::User)
        } else if name.eq_ignore_ascii_case("ADMIN") {
            Ok(Role::Admin)
        } else {
            Err(UnknownRole(s.to_string()))
        }
    }
}

/// Identity bound to a single request after authentication.
///
/// - `subject` is the token subject (the account email)
/// - `roles` and `enabled` come from the live directory lookup, never from the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub subject: String,
    pub roles: BTreeSet<Role>,
    pub enabled: bool,
}

impl Principal {
    pub fn has_any_role(&self, required: &BTreeSet<Role>) -> bool {
        !self.roles.is_disjoint(required)
    }
}

/// Request-scoped authentication outcome stored in request extensions.
///
/// `Anonymous` keeps the reason a presented credential was dropped so the
/// authorization boundary can tell the client *why* it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous(Option<AuthError>),
    Authenticated(Principal),
}

impl Identity {
    pub fn anonymous() -> Self {
        Identity::Anonymous(None)
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Authenticated(p) => Some(p),
            Identity::Anonymous(_) => None,
        }
    }
}
