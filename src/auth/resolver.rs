//! Identity resolution strategies.
//!
//! The two strategies have deliberately different miss semantics: the
//! identity-provider path reports a missing profile as `IdentityNotFound`,
//! while the hybrid path reports a missing authorization record as
//! `NotAuthorized`. Both assume any email normalization already happened
//! upstream and match exactly; only the login exchange normalizes.

use sqlx::PgPool;

use crate::auth::error::{AuthFailureKind, ResolveError};
use crate::auth::principal::{AccountPrincipal, ProfilePrincipal};
use crate::auth::store;

/// Resolve a verified email to a personal-information profile.
///
/// This path never checks authorization flags; the resulting principal is
/// authenticated but unauthorized, and any gating is the caller's
/// responsibility downstream.
///
/// # Errors
///
/// `IdentityNotFound` when no profile matches; store errors pass through.
pub async fn resolve_idp_profile(
    pool: &PgPool,
    subject_email: &str,
) -> Result<ProfilePrincipal, ResolveError> {
    let profile = store::lookup_profile(pool, subject_email).await?;
    Ok(profile_resolution(profile)?)
}

/// Resolve a verified email to an authorized account.
///
/// The `is_active` check is embedded in resolution on this path; the full
/// flags gate still runs separately for guarded operations.
///
/// # Errors
///
/// `NotAuthorized` when no authorization record matches, `InactiveAccount`
/// when one matches but is disabled; store errors pass through.
pub async fn resolve_hybrid_account(
    pool: &PgPool,
    subject_email: &str,
) -> Result<AccountPrincipal, ResolveError> {
    let account = store::lookup_account_by_email(pool, subject_email).await?;
    Ok(account_resolution(account)?)
}

/// Resolve an opaque API token to its account by verbatim lookup.
///
/// # Errors
///
/// `InvalidToken` when the token matches nothing; store errors pass through.
pub async fn resolve_opaque_token(
    pool: &PgPool,
    token: &str,
) -> Result<AccountPrincipal, ResolveError> {
    let account = store::lookup_token_account(pool, token).await?;
    Ok(token_resolution(account)?)
}

/// Decision for the identity-provider strategy: a miss means the person is
/// unknown to the university records.
fn profile_resolution(
    profile: Option<ProfilePrincipal>,
) -> Result<ProfilePrincipal, AuthFailureKind> {
    profile.ok_or(AuthFailureKind::IdentityNotFound)
}

/// Decision for the hybrid strategy: a miss means the account is not
/// authorized, and a disabled record wins over everything else.
fn account_resolution(
    account: Option<AccountPrincipal>,
) -> Result<AccountPrincipal, AuthFailureKind> {
    let Some(account) = account else {
        return Err(AuthFailureKind::NotAuthorized);
    };
    match account.flags {
        Some(flags) if !flags.is_active => Err(AuthFailureKind::InactiveAccount),
        _ => Ok(account),
    }
}

/// Decision for opaque tokens: a miss is an invalid token, nothing more
/// specific.
fn token_resolution(
    account: Option<AccountPrincipal>,
) -> Result<AccountPrincipal, AuthFailureKind> {
    account.ok_or_else(|| {
        AuthFailureKind::InvalidToken("Invalid token or authentication failed.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::{AuthorizationFlags, PersonRole};
    use uuid::Uuid;

    fn account(flags: Option<AuthorizationFlags>) -> AccountPrincipal {
        AccountPrincipal {
            user_id: Uuid::nil(),
            email: "a@uvaq.edu.mx".to_string(),
            flags,
        }
    }

    fn profile() -> ProfilePrincipal {
        ProfilePrincipal {
            person_id: 1,
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            second_last_name: String::new(),
            role: PersonRole::Student,
            photo: None,
            institutional_email: "a@uvaq.edu.mx".to_string(),
            phone: None,
        }
    }

    #[test]
    fn the_two_strategies_have_different_miss_semantics() {
        // Same situation (nothing matched), different failure per strategy.
        assert_eq!(
            profile_resolution(None).unwrap_err(),
            AuthFailureKind::IdentityNotFound
        );
        assert_eq!(
            account_resolution(None).unwrap_err(),
            AuthFailureKind::NotAuthorized
        );
    }

    #[test]
    fn inactive_account_fails_even_when_authorized() {
        let flags = AuthorizationFlags {
            is_active: false,
            is_authorized: true,
            can_manage_users: true,
        };
        assert_eq!(
            account_resolution(Some(account(Some(flags)))).unwrap_err(),
            AuthFailureKind::InactiveAccount
        );
    }

    #[test]
    fn active_account_resolves_regardless_of_authorized_flag() {
        // is_authorized is the gate's concern, not resolution's.
        let flags = AuthorizationFlags {
            is_active: true,
            is_authorized: false,
            can_manage_users: false,
        };
        let resolved = account_resolution(Some(account(Some(flags)))).expect("resolves");
        assert_eq!(resolved.email, "a@uvaq.edu.mx");
    }

    #[test]
    fn profile_hit_resolves_without_flag_checks() {
        let resolved = profile_resolution(Some(profile())).expect("resolves");
        assert_eq!(resolved.institutional_email, "a@uvaq.edu.mx");
    }

    #[test]
    fn token_miss_is_an_invalid_token() {
        assert_eq!(
            token_resolution(None).unwrap_err(),
            AuthFailureKind::InvalidToken("Invalid token or authentication failed.".to_string())
        );
    }

    #[test]
    fn resolution_is_idempotent_for_the_same_stored_state() {
        let flags = AuthorizationFlags {
            is_active: true,
            is_authorized: true,
            can_manage_users: false,
        };
        let first = account_resolution(Some(account(Some(flags))));
        let second = account_resolution(Some(account(Some(flags))));
        assert_eq!(first, second);
    }
}
