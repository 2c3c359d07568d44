/*
 * Responsibility
 * - "Account still enabled" check for an already-authenticated identity
 * - Allow-list of account-lifecycle routes a disabled user must still reach
 *
 * Notes
 * - This does not verify identity; it only reads what the authentication step produced.
 * - Exemptions match exact method + exact path. No prefixes, no patterns.
 */
use std::collections::HashSet;

use axum::http::Method;

use crate::services::auth::error::AuthError;
use crate::services::auth::principal::Identity;

#[derive(Debug, Clone, Default)]
pub struct StatusExemptions {
    routes: HashSet<(Method, String)>,
}

impl StatusExemptions {
    pub fn new<'a>(routes: impl IntoIterator<Item = (Method, &'a str)>) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|(method, path)| (method, path.to_string()))
                .collect(),
        }
    }

    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        // Avoid allocating a key for the common (non-exempt) case.
        self.routes
            .iter()
            .any(|(m, p)| m == method && p == path)
    }
}

/// Ok for anonymous identities, enabled principals and exempt routes.
pub fn check_account_status(identity: &Identity, exempt: bool) -> Result<(), AuthError> {
    match identity {
        Identity::Authenticated(principal) if !principal.enabled && !exempt => {
            Err(AuthError::DisabledAccount)
        }
        _ => Ok(()),
    }
}
