//! Static route classification: who may call what.
//!
//! One table, built once at startup and read-only afterwards. Every request
//! is classified against it before the gates run, and the same classification
//! is enforced at the authorization boundary.
//!
//! Resolution order for `(method, path)`:
//! 1. exact path, method-specific entry
//! 2. exact path, any-method entry
//! 3. pattern (`{param}`, `{*rest}`), method-specific entry
//! 4. pattern, any-method entry
//!
//! Nothing matched means deny.
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use thiserror::Error;

use crate::services::auth::error::AuthError;
use crate::services::auth::principal::{Identity, Role};

/// Access requirement of one route entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Authenticated,
    /// Principal must hold at least one of these roles.
    AnyRole(BTreeSet<Role>),
}

impl FromStr for RouteAccess {
    type Err = RoutePolicyError;

    /// `PUBLIC`, `AUTHENTICATED` or `ROLE:<name>[,<name>...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("PUBLIC") {
            return Ok(RouteAccess::Public);
        }
        if s.eq_ignore_ascii_case("AUTHENTICATED") {
            return Ok(RouteAccess::Authenticated);
        }

        let names = s
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("ROLE:"))
            .map(|_| &s[5..])
            .ok_or_else(|| RoutePolicyError::InvalidAccess(s.to_string()))?;

        let roles = names
            .split(',')
            .map(|name| {
                name.parse::<Role>()
                    .map_err(|_| RoutePolicyError::InvalidAccess(s.to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(RouteAccess::AnyRole(roles))
    }
}

impl fmt::Display for RouteAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteAccess::Public => f.write_str("PUBLIC"),
            RouteAccess::Authenticated => f.write_str("AUTHENTICATED"),
            RouteAccess::AnyRole(roles) => {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                write!(f, "ROLE:{}", names.join(","))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RoutePolicyError {
    #[error("invalid route access: {0}")]
    InvalidAccess(String),
    #[error("invalid route method: {0}")]
    InvalidMethod(String),
    #[error("route path must start with '/': {0}")]
    InvalidPath(String),
    #[error("duplicate route entry: {method} {path}")]
    Duplicate { method: String, path: String },
    #[error("route pattern rejected '{path}': {source}")]
    Pattern {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// Why the authorization boundary refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Route needs an identity and there is none; carries why a presented token was dropped.
    Unauthenticated(Option<AuthError>),
    InsufficientRole,
    /// Route is not in the table.
    Unclassified,
}

struct EntrySet {
    exact: HashMap<String, RouteAccess>,
    patterns: matchit::Router<RouteAccess>,
}

impl Default for EntrySet {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: matchit::Router::new(),
        }
    }
}

impl EntrySet {
    fn insert(&mut self, method: &str, path: &str, access: RouteAccess) -> Result<(), RoutePolicyError> {
        if is_pattern(path) {
            self.patterns
                .insert(path, access)
                .map_err(|source| match source {
                    matchit::InsertError::Conflict { .. } => RoutePolicyError::Duplicate {
                        method: method.to_string(),
                        path: path.to_string(),
                    },
                    source => RoutePolicyError::Pattern {
                        path: path.to_string(),
                        source,
                    },
                })
        } else if self.exact.insert(path.to_string(), access).is_some() {
            Err(RoutePolicyError::Duplicate {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn exact(&self, path: &str) -> Option<&RouteAccess> {
        self.exact.get(path)
    }

    fn pattern(&self, path: &str) -> Option<&RouteAccess> {
        self.patterns.at(path).ok().map(|m| m.value)
    }
}

fn is_pattern(path: &str) -> bool {
    path.contains('{')
}

/// The route table. Cheap to share behind an `Arc`; never mutated after build.
#[derive(Default)]
pub struct RoutePolicy {
    by_method: HashMap<Method, EntrySet>,
    any_method: EntrySet,
    len: usize,
}

impl fmt::Debug for RoutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePolicy")
            .field("entries", &self.len)
            .finish()
    }
}

impl RoutePolicy {
    /// Build from `(method, path, access)` rows. Method `*` matches every method.
    pub fn from_rows<'a>(
        rows: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    ) -> Result<Self, RoutePolicyError> {
        let mut policy = RoutePolicy::default();
        for (method, path, access) in rows {
            policy.insert(method, path, access.parse()?)?;
        }
        Ok(policy)
    }

    pub fn insert(&mut self, method: &str, path: &str, access: RouteAccess) -> Result<(), RoutePolicyError> {
        if !path.starts_with('/') {
            return Err(RoutePolicyError::InvalidPath(path.to_string()));
        }

        let set = if method.trim() == "*" {
            &mut self.any_method
        } else {
            let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| RoutePolicyError::InvalidMethod(method.to_string()))?;
            self.by_method.entry(method).or_default()
        };

        set.insert(method, path, access)?;
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `None` means the route is unclassified and must be denied.
    ///
    /// `HEAD` is served by the `GET` handler, so without rows of its own it is
    /// classified exactly like `GET`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&RouteAccess> {
        let method = match method {
            m if *m == Method::HEAD && !self.by_method.contains_key(m) => &Method::GET,
            m => m,
        };
        let specific = self.by_method.get(method);

        specific
            .and_then(|s| s.exact(path))
            .or_else(|| self.any_method.exact(path))
            .or_else(|| specific.and_then(|s| s.pattern(path)))
            .or_else(|| self.any_method.pattern(path))
    }
}

/// Final decision for a classified (or unclassified) route and the request identity.
pub fn authorize(access: Option<&RouteAccess>, identity: &Identity) -> Result<(), Denial> {
    let access = access.ok_or(Denial::Unclassified)?;

    let principal = match (access, identity) {
        (RouteAccess::Public, _) => return Ok(()),
        (_, Identity::Anonymous(reason)) => return Err(Denial::Unauthenticated(*reason)),
        (_, Identity::Authenticated(principal)) => principal,
    };

    match access {
        RouteAccess::AnyRole(roles) if !principal.has_any_role(roles) => Err(Denial::InsufficientRole),
        _ => Ok(()),
    }
}
