use std::collections::BTreeSet;
use std::{future::Future, pin::Pin};

use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::repos::error::RepoError;
use crate::repos::user_repo::{self, UserRow};
use crate::services::auth::principal::{Principal, Role};

/// Live account state as seen by the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub subject: String,
    pub enabled: bool,
    pub roles: BTreeSet<Role>,
}

impl UserRecord {
    pub fn into_principal(self) -> Principal {
        Principal {
            user_id: self.user_id,
            subject: self.subject,
            roles: self.roles,
            enabled: self.enabled,
        }
    }
}

/// Account plus the stored password hash (PHC string), for sign-in only.
#[derive(Clone)]
pub struct StoredCredentials {
    pub record: UserRecord,
    pub password_hash: String,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub subject: String,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("account already exists")]
    Conflict,
    #[error("directory backend error: {0}")]
    Backend(String),
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// User directory collaborator.
///
/// `lookup_by_subject` runs once per authenticated request. Implementations
/// must not cache: the `enabled` flag has to be fresh for disablement to
/// take effect on tokens that are still unexpired.
///
/// `Ok(None)` is "not found"; `Err(_)` is a backend failure (fail closed).
pub trait UserDirectory: Send + Sync {
    fn lookup_by_subject<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, DirectoryResult<Option<UserRecord>>>;

    fn find_credentials<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, DirectoryResult<Option<StoredCredentials>>>;

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, DirectoryResult<UserRecord>>;

    /// Returns false when no such account exists.
    fn set_enabled<'a>(&'a self, subject: &'a str, enabled: bool) -> BoxFuture<'a, DirectoryResult<bool>>;
}

/// Postgres-backed directory over the `users` table.
#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn record_from_row(row: UserRow) -> UserRecord {
    let roles = row
        .roles
        .iter()
        .filter_map(|raw| match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(user_id = %row.id, error = %e, "ignoring unknown role on account");
                None
            }
        })
        .collect();

    UserRecord {
        user_id: row.id,
        subject: row.email,
        enabled: row.enabled,
        roles,
    }
}

impl From<RepoError> for DirectoryError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => DirectoryError::Conflict,
            RepoError::Db(e) => DirectoryError::Backend(e.to_string()),
        }
    }
}

impl UserDirectory for PgUserDirectory {
    fn lookup_by_subject<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, DirectoryResult<Option<UserRecord>>> {
        Box::pin(async move {
            let row = user_repo::find_by_email(&self.db, subject).await?;
            Ok(row.map(record_from_row))
        })
    }

    fn find_credentials<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, DirectoryResult<Option<StoredCredentials>>> {
        Box::pin(async move {
            let row = user_repo::find_credentials(&self.db, subject).await?;
            Ok(row.map(|r| StoredCredentials {
                record: record_from_row(r.user),
                password_hash: r.password_hash,
            }))
        })
    }

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, DirectoryResult<UserRecord>> {
        Box::pin(async move {
            let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
            let row = user_repo::create(&self.db, &user.subject, &user.password_hash, &roles).await?;
            Ok(record_from_row(row))
        })
    }

    fn set_enabled<'a>(&'a self, subject: &'a str, enabled: bool) -> BoxFuture<'a, DirectoryResult<bool>> {
        Box::pin(async move { Ok(user_repo::set_enabled(&self.db, subject, enabled).await?) })
    }
}
