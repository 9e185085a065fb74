//! Secondary authorization gate over stored account flags.

use crate::auth::dispatcher::{AuthDecision, Authenticated};
use crate::auth::error::AuthFailureKind;
use crate::auth::principal::AuthorizationFlags;

/// Capability required by a protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Active and authorized.
    Standard,
    /// Active, authorized, and allowed to manage other users.
    ManageOthers,
}

/// Evaluate a flags snapshot against a required capability.
///
/// Both the request guard and explicit in-handler checks call this same
/// function, so identical flag state always yields identical decisions.
///
/// # Errors
///
/// `NotAuthorized` when there is no authorization record at all,
/// `InactiveAccount` when the record is disabled, `InsufficientPrivilege`
/// when it is active but not authorized or lacks the manage capability.
/// Privilege failures use the same reason for both capabilities.
pub fn check(
    flags: Option<&AuthorizationFlags>,
    capability: Capability,
) -> Result<(), AuthFailureKind> {
    let Some(flags) = flags else {
        return Err(AuthFailureKind::NotAuthorized);
    };
    if !flags.is_active {
        return Err(AuthFailureKind::InactiveAccount);
    }
    if !flags.is_authorized {
        return Err(AuthFailureKind::InsufficientPrivilege);
    }
    if capability == Capability::ManageOthers && !flags.can_manage_users {
        return Err(AuthFailureKind::InsufficientPrivilege);
    }
    Ok(())
}

/// Gate an authenticated request, producing the terminal decision.
#[must_use]
pub fn authorize(auth: Authenticated, capability: Capability) -> AuthDecision {
    match check(auth.principal.authorization_flags(), capability) {
        Ok(()) => AuthDecision::Allow(auth),
        Err(reason) => AuthDecision::Deny(reason),
    }
}
