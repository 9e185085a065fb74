//! Hybrid credential dispatch.
//!
//! One dispatcher handles both guarded route families, parameterized by a
//! strategy: the identity-provider-only variant returns the raw profile and
//! never consults local authorization flags; the hybrid variant resolves
//! through the authorization record and additionally accepts opaque API
//! tokens. Both share header parsing and bearer verification.

use axum::http::HeaderMap;
use sqlx::PgPool;

use crate::auth::credential::Credential;
use crate::auth::error::{AuthFailureKind, ResolveError};
use crate::auth::principal::Principal;
use crate::auth::verifier::verify_bearer;
use crate::auth::{resolver, web_flow};
use crate::idp::IdpVerifier;

/// Which resolution family a guarded route uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Bearer tokens only; yields the raw profile as principal.
    IdpOnly,
    /// Bearer tokens resolved through the authorization record, with opaque
    /// API tokens accepted as the second scheme.
    Hybrid,
}

/// Successful authentication outcome: the resolved principal plus the
/// opaque credential payload surfaced to the caller (the raw bearer token
/// on the IdP-only path, nothing otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub principal: Principal,
    pub credential: Option<String>,
}

/// Terminal outcome of the authentication pipeline for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow(Authenticated),
    Deny(AuthFailureKind),
}

/// Dispatches one request's credential material to the right verification
/// path. The first failure encountered is terminal; nothing is retried.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    strategy: Strategy,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    /// Run the scheme state machine over the `Authorization` header.
    ///
    /// # Errors
    ///
    /// Only store/infrastructure errors surface as `Err`; every
    /// authentication outcome, including denials, is an `Ok(AuthDecision)`.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        verifier: &IdpVerifier,
        pool: &PgPool,
    ) -> anyhow::Result<AuthDecision> {
        let credential = match Credential::from_headers(headers) {
            Ok(credential) => credential,
            Err(kind) => return Ok(AuthDecision::Deny(kind)),
        };

        match (credential, self.strategy) {
            (Credential::Bearer(token), Strategy::IdpOnly) => {
                let claim = match verify_bearer(verifier, &token).await {
                    Ok(claim) => claim,
                    Err(kind) => return Ok(AuthDecision::Deny(kind)),
                };
                match resolver::resolve_idp_profile(pool, &claim.subject_email).await {
                    Ok(profile) => Ok(AuthDecision::Allow(Authenticated {
                        principal: Principal::Profile(profile),
                        credential: Some(token),
                    })),
                    Err(ResolveError::Denied(kind)) => Ok(AuthDecision::Deny(kind)),
                    Err(ResolveError::Store(err)) => Err(err),
                }
            }
            (Credential::Bearer(token), Strategy::Hybrid) => {
                let claim = match verify_bearer(verifier, &token).await {
                    Ok(claim) => claim,
                    Err(kind) => return Ok(AuthDecision::Deny(kind)),
                };
                match resolver::resolve_hybrid_account(pool, &claim.subject_email).await {
                    Ok(account) => Ok(AuthDecision::Allow(Authenticated {
                        principal: Principal::Account(account),
                        credential: None,
                    })),
                    Err(ResolveError::Denied(kind)) => Ok(AuthDecision::Deny(kind)),
                    Err(ResolveError::Store(err)) => Err(err),
                }
            }
            (Credential::OpaqueToken(token), Strategy::Hybrid) => {
                match resolver::resolve_opaque_token(pool, &token).await {
                    Ok(account) => Ok(AuthDecision::Allow(Authenticated {
                        principal: Principal::Account(account),
                        credential: None,
                    })),
                    Err(ResolveError::Denied(kind)) => Ok(AuthDecision::Deny(kind)),
                    Err(ResolveError::Store(err)) => Err(err),
                }
            }
            // Bearer tokens are required on the IdP-only path.
            (Credential::OpaqueToken(_), Strategy::IdpOnly) => {
                Ok(AuthDecision::Deny(AuthFailureKind::UnsupportedScheme))
            }
            // Session references never come from the Authorization header.
            (Credential::SessionRef { .. }, _) => {
                Ok(AuthDecision::Deny(AuthFailureKind::UnsupportedScheme))
            }
        }
    }
}

/// Entry point for request authentication.
///
/// The web-flow bypass takes priority over the standard dispatcher for
/// matching upload paths and is always evaluated first.
///
/// # Errors
///
/// Only store/infrastructure errors surface as `Err`.
pub async fn authenticate_request(
    path: &str,
    headers: &HeaderMap,
    verifier: &IdpVerifier,
    pool: &PgPool,
    strategy: Strategy,
) -> anyhow::Result<AuthDecision> {
    if web_flow::bypasses_token_auth(path) {
        return web_flow::authenticate(path, headers, pool).await;
    }
    Dispatcher::new(strategy).authenticate(headers, verifier, pool).await
}
