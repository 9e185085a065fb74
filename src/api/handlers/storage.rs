//! Database helpers for the login exchange and authorized-user management.
//!
//! Writes here are the only mutations of authorization state in the
//! service; each runs read-modify-write under a transaction so concurrent
//! auth checks read either the old or new flags, never a torn value.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::types::{
    AuthorizedUserRequest, AuthorizedUserResponse, AuthorizedUserUpdateRequest, UserSummary,
};
use crate::auth::principal::AuthorizationFlags;

/// Minimal fields needed by the login exchange.
pub(crate) struct LoginRecord {
    pub(crate) user_id: Uuid,
    pub(crate) password_hash: String,
    pub(crate) flags: Option<AuthorizationFlags>,
}

/// Outcome when creating an account plus its authorization record.
#[derive(Debug)]
pub(crate) enum InsertOutcome {
    Created(AuthorizedUserResponse),
    Conflict,
}

/// Look up login data by email. The caller normalizes the email first.
pub(crate) async fn lookup_login_record(
    pool: &PgPool,
    email: &str,
) -> Result<Option<LoginRecord>> {
    let query = r"
        SELECT u.id, u.password_hash, a.is_active, a.is_authorized, a.can_manage_users
        FROM users u
        LEFT JOIN authorized_users a ON a.user_id = u.id
        WHERE u.email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    Ok(row.map(|row| {
        let is_active: Option<bool> = row.get("is_active");
        let is_authorized: Option<bool> = row.get("is_authorized");
        let can_manage_users: Option<bool> = row.get("can_manage_users");
        let flags = match (is_active, is_authorized, can_manage_users) {
            (Some(is_active), Some(is_authorized), Some(can_manage_users)) => {
                Some(AuthorizationFlags {
                    is_active,
                    is_authorized,
                    can_manage_users,
                })
            }
            _ => None,
        };
        LoginRecord {
            user_id: row.get("id"),
            password_hash: row.get("password_hash"),
            flags,
        }
    }))
}

/// Mint a new opaque API token. The raw value is only returned to the
/// caller of the login exchange; lookups compare it verbatim.
pub(crate) fn generate_api_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate api token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Return the account's existing token or mint one. Login reuses tokens,
/// so repeated logins hand back the same stable secret.
pub(crate) async fn get_or_create_token(pool: &PgPool, user_id: Uuid) -> Result<String> {
    if let Some(token) = existing_token(pool, user_id).await? {
        return Ok(token);
    }

    let query = "INSERT INTO api_tokens (token, user_id) VALUES ($1, $2)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_api_token()?;
        let result = sqlx::query(query)
            .bind(&token)
            .bind(user_id)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {
                // Either a concurrent login won the race on user_id, or the
                // token itself collided. Reuse the winner if there is one.
                if let Some(token) = existing_token(pool, user_id).await? {
                    return Ok(token);
                }
            }
            Err(err) => return Err(err).context("failed to insert api token"),
        }
    }

    Err(anyhow!("failed to generate unique api token"))
}

async fn existing_token(pool: &PgPool, user_id: Uuid) -> Result<Option<String>> {
    let query = "SELECT token FROM api_tokens WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup api token")?;
    Ok(row.map(|row| row.get("token")))
}

/// List authorized users, active ones only.
pub(crate) async fn list_active_authorized_users(
    pool: &PgPool,
) -> Result<Vec<AuthorizedUserResponse>> {
    let query = r#"
        SELECT a.id, a.is_authorized, a.can_manage_users,
               to_char(a.date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined,
               u.first_name, u.last_name, u.username, u.email
        FROM authorized_users a
        JOIN users u ON u.id = a.user_id
        WHERE a.is_active
        ORDER BY a.date_joined DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list authorized users")?;

    Ok(rows.iter().map(response_from_row).collect())
}

/// Fetch a single authorized user by record id, regardless of active state.
pub(crate) async fn fetch_authorized_user(
    pool: &PgPool,
    id: i64,
) -> Result<Option<AuthorizedUserResponse>> {
    let query = r#"
        SELECT a.id, a.is_authorized, a.can_manage_users,
               to_char(a.date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined,
               u.first_name, u.last_name, u.username, u.email
        FROM authorized_users a
        JOIN users u ON u.id = a.user_id
        WHERE a.id = $1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch authorized user")?;

    Ok(row.as_ref().map(response_from_row))
}

/// Create the account and its authorization record in one transaction.
pub(crate) async fn insert_authorized_user(
    pool: &PgPool,
    request: &AuthorizedUserRequest,
    password_hash: &str,
) -> Result<InsertOutcome> {
    let mut tx = pool.begin().await.context("begin create transaction")?;

    let query = r"
        INSERT INTO users (username, email, first_name, last_name, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&request.user.username)
        .bind(&request.user.email)
        .bind(&request.user.first_name)
        .bind(&request.user.last_name)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(InsertOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    let query = r#"
        INSERT INTO authorized_users (user_id, is_authorized, can_manage_users)
        VALUES ($1, $2, $3)
        RETURNING id,
                  to_char(date_joined AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS date_joined
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(request.is_authorized)
        .bind(request.can_manage_users)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert authorized user")?;

    tx.commit().await.context("commit create transaction")?;

    Ok(InsertOutcome::Created(AuthorizedUserResponse {
        id: row.get("id"),
        user: UserSummary {
            first_name: request.user.first_name.clone(),
            last_name: request.user.last_name.clone(),
            username: request.user.username.clone(),
            email: request.user.email.clone(),
        },
        is_authorized: request.is_authorized,
        can_manage_users: request.can_manage_users,
        date_joined: row.get("date_joined"),
    }))
}

/// Apply a partial update to the authorization record and, when present,
/// the nested user fields. Returns the refreshed record, or `None` when the
/// id matches nothing.
pub(crate) async fn update_authorized_user(
    pool: &PgPool,
    id: i64,
    changes: &AuthorizedUserUpdateRequest,
    password_hash: Option<&str>,
) -> Result<Option<AuthorizedUserResponse>> {
    let mut tx = pool.begin().await.context("begin update transaction")?;

    let query = r"
        UPDATE authorized_users
        SET is_authorized = COALESCE($2, is_authorized),
            can_manage_users = COALESCE($3, can_manage_users)
        WHERE id = $1
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(changes.is_authorized)
        .bind(changes.can_manage_users)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update authorized user")?;

    let Some(row) = row else {
        tx.commit().await.context("commit update noop")?;
        return Ok(None);
    };

    if let Some(user) = &changes.user {
        let user_id: Uuid = row.get("user_id");
        let query = r"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                username = COALESCE($4, username),
                email = COALESCE($5, email),
                password_hash = COALESCE($6, password_hash)
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(user.first_name.as_deref())
            .bind(user.last_name.as_deref())
            .bind(user.username.as_deref())
            .bind(user.email.as_deref())
            .bind(password_hash)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to update user fields")?;
    }

    tx.commit().await.context("commit update transaction")?;

    fetch_authorized_user(pool, id).await
}

/// Soft delete: mark the authorization record inactive instead of removing
/// it. Returns false when the id matches nothing.
pub(crate) async fn deactivate_authorized_user(pool: &PgPool, id: i64) -> Result<bool> {
    let query = "UPDATE authorized_users SET is_active = FALSE WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate authorized user")?;
    Ok(result.rows_affected() > 0)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn response_from_row(row: &sqlx::postgres::PgRow) -> AuthorizedUserResponse {
    AuthorizedUserResponse {
        id: row.get("id"),
        user: UserSummary {
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            username: row.get("username"),
            email: row.get("email"),
        },
        is_authorized: row.get("is_authorized"),
        can_manage_users: row.get("can_manage_users"),
        date_joined: row.get("date_joined"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};

    #[test]
    fn generated_tokens_are_32_random_bytes() -> Result<()> {
        let token = generate_api_token()?;
        let decoded = Base64UrlUnpadded::decode_vec(&token)
            .map_err(|_| anyhow!("token is not base64url"))?;
        assert_eq!(decoded.len(), 32);

        let other = generate_api_token()?;
        assert_ne!(token, other);
        Ok(())
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
