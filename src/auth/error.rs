//! Failure taxonomy for the authentication pipeline.

use thiserror::Error;

/// Why a request was denied. The guard layer collapses every variant into
/// one generic client-facing message; the variants exist so call sites and
/// tests can tell the stages apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailureKind {
    #[error("Authorization header is missing")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    MalformedHeader,
    #[error("Unsupported authorization type")]
    UnsupportedScheme,
    /// Signature, issuer, claim, or opaque-lookup failure. The message is
    /// human-readable and never tells the caller which check failed in
    /// detail.
    #[error("{0}")]
    InvalidToken(String),
    /// No personal-information record matches the verified email.
    #[error("User not found in the university database")]
    IdentityNotFound,
    /// No authorization record exists for the account.
    #[error("User is not authorized to use this service")]
    NotAuthorized,
    /// Authorization record present but disabled.
    #[error("User is not active")]
    InactiveAccount,
    /// Authorized but lacking a required capability.
    #[error("User does not have permission to perform this action")]
    InsufficientPrivilege,
    /// Web upload flow without a valid session flag.
    #[error("Web authentication required")]
    WebAuthRequired,
}

/// Resolution stages can fail two ways: a typed denial, or an underlying
/// store error that is not an authentication outcome at all.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Denied(#[from] AuthFailureKind),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
