//! Read-path lookups against the account store.
//!
//! Every query reads current stored state; nothing here is cached, so each
//! request re-evaluates authorization from the database.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use crate::auth::principal::{
    AccountPrincipal, AuthorizationFlags, PersonRole, ProfilePrincipal,
};

/// Look up a personal-information profile by institutional email.
///
/// The match is exact and case-sensitive; normalization, if any, is the
/// caller's concern.
pub(crate) async fn lookup_profile(
    pool: &PgPool,
    institutional_email: &str,
) -> Result<Option<ProfilePrincipal>> {
    let query = r"
        SELECT p.id, p.first_name, p.last_name, p.second_last_name, p.role, p.photo,
               c.institutional_email, c.phone
        FROM personal_information p
        JOIN contact_information c ON c.person_id = p.id
        WHERE c.institutional_email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(institutional_email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup personal information")?;

    Ok(row.map(|row| ProfilePrincipal {
        person_id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        second_last_name: row.get("second_last_name"),
        role: PersonRole::from_db(row.get("role")),
        photo: row.get("photo"),
        institutional_email: row.get("institutional_email"),
        phone: row.get("phone"),
    }))
}

/// Look up an account through its authorization record, keyed by the
/// account's email. Misses cover both "no such account" and "account without
/// an authorization record".
pub(crate) async fn lookup_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountPrincipal>> {
    let query = r"
        SELECT u.id, u.email, a.is_active, a.is_authorized, a.can_manage_users
        FROM authorized_users a
        JOIN users u ON u.id = a.user_id
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
        .context("failed to lookup authorized account")?;

    Ok(row.map(|row| AccountPrincipal {
        user_id: row.get("id"),
        email: row.get("email"),
        flags: Some(AuthorizationFlags {
            is_active: row.get("is_active"),
            is_authorized: row.get("is_authorized"),
            can_manage_users: row.get("can_manage_users"),
        }),
    }))
}

/// Look up the account tied to an opaque API token. The token is compared
/// verbatim. The authorization record is optional here; the gate decides
/// what its absence means.
pub(crate) async fn lookup_token_account(
    pool: &PgPool,
    token: &str,
) -> Result<Option<AccountPrincipal>> {
    let query = r"
        SELECT u.id, u.email, a.is_active, a.is_authorized, a.can_manage_users
        FROM api_tokens t
        JOIN users u ON u.id = t.user_id
        LEFT JOIN authorized_users a ON a.user_id = u.id
        WHERE t.token = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup api token")?;

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
        AccountPrincipal {
            user_id: row.get("id"),
            email: row.get("email"),
            flags,
        }
    }))
}

/// Whether a web session carries a given flag. Presence of a row is truthy;
/// rows are written by the web collaborator, never here.
pub(crate) async fn web_session_flag_set(
    pool: &PgPool,
    session_key: &str,
    flag: &str,
) -> Result<bool> {
    let query = r"
        SELECT EXISTS(
            SELECT 1 FROM web_session_flags
            WHERE session_key = $1 AND flag = $2
        ) AS present
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(session_key)
        .bind(flag)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check web session flag")?;

    Ok(row.get("present"))
}
