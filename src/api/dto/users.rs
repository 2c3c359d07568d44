/*
 * Responsibility
 * - アカウント情報の response DTO / 管理用 request DTO
 */
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::services::auth::directory::UserRecord;
use crate::services::auth::principal::{Principal, Role};

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub subject: String,
    pub roles: BTreeSet<Role>,
    pub enabled: bool,
}

impl From<Principal> for AccountResponse {
    fn from(p: Principal) -> Self {
        Self {
            subject: p.subject,
            roles: p.roles,
            enabled: p.enabled,
        }
    }
}

impl From<UserRecord> for AccountResponse {
    fn from(r: UserRecord) -> Self {
        r.into_principal().into()
    }
}

/// `PATCH /api/admin/users/{subject}/status`
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub enabled: bool,
}
