/*
 * Responsibility
 * - users テーブル向け SQLx 操作 (認証に必要な列だけ)
 * - PgPool を受け取り lookup / create / enable-disable を提供
 * - DB エラーは RepoError に変換して返す
 */
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, FromRow)]
pub struct UserRow {
    #[sqlx(rename = "userId")]
    pub id: Uuid,
    pub email: String,
    pub enabled: bool,
    pub roles: Vec<String>,
}

#[derive(FromRow)]
pub struct CredentialRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    #[sqlx(rename = "passwordHash")]
    pub password_hash: String,
}

pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<UserRow>, RepoError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT "userId", email, enabled, roles
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn find_credentials(db: &PgPool, email: &str) -> Result<Option<CredentialRow>, RepoError> {
    let row = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT "userId", email, enabled, roles, "passwordHash"
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn create(
    db: &PgPool,
    email: &str,
    password_hash: &str,
    roles: &[String],
) -> Result<UserRow, RepoError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (email, "passwordHash", enabled, roles)
        VALUES ($1, $2, true, $3)
        RETURNING "userId", email, enabled, roles
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(roles)
    .fetch_one(db)
    .await
    .map_err(RepoError::from_sqlx)?;

    Ok(row)
}

pub async fn set_enabled(db: &PgPool, email: &str, enabled: bool) -> Result<bool, RepoError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET enabled = $2
        WHERE email = $1
        "#,
    )
    .bind(email)
    .bind(enabled)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}
