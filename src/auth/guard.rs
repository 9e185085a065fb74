//! Request guards for protected handlers.
//!
//! The guards run the full authentication chain and deliberately collapse
//! every internal failure reason into one generic client-facing 401 so the
//! response does not reveal which check failed. Store errors are not
//! authentication failures and map to 500 instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, warn};

use crate::auth::dispatcher::{authenticate_request, AuthDecision, Authenticated, Strategy};
use crate::auth::gate::{self, Capability};
use crate::auth::principal::Principal;
use crate::idp::IdpVerifier;

/// The one body every guarded failure produces.
#[must_use]
pub fn invalid_token_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Invalid Token"})),
    )
        .into_response()
}

/// Guard for hybrid-authenticated routes: token pipeline (or web-flow
/// bypass for matching paths) followed by the flags gate.
///
/// # Errors
///
/// Returns the ready-to-send failure response: a generic 401 for any
/// denial, 500 for store errors.
pub async fn authorized_user_required(
    path: &str,
    headers: &axum::http::HeaderMap,
    verifier: &IdpVerifier,
    pool: &PgPool,
    capability: Capability,
) -> Result<Authenticated, Response> {
    let auth = run_chain(path, headers, verifier, pool, Strategy::Hybrid).await?;

    // Session-bound principals carry their authorization in the session
    // flag itself; the flags gate applies to account-backed principals.
    if matches!(auth.principal, Principal::WebSession(_)) {
        return Ok(auth);
    }

    match gate::authorize(auth, capability) {
        AuthDecision::Allow(auth) => Ok(auth),
        AuthDecision::Deny(reason) => {
            warn!(%reason, "authorization denied");
            Err(invalid_token_response())
        }
    }
}

/// Guard for identity-provider routes: authentication only, no flags gate.
/// The resulting profile principal is authenticated but unauthorized by
/// construction.
///
/// # Errors
///
/// Returns the ready-to-send failure response, as above.
pub async fn idp_user_required(
    path: &str,
    headers: &axum::http::HeaderMap,
    verifier: &IdpVerifier,
    pool: &PgPool,
) -> Result<Authenticated, Response> {
    run_chain(path, headers, verifier, pool, Strategy::IdpOnly).await
}

async fn run_chain(
    path: &str,
    headers: &axum::http::HeaderMap,
    verifier: &IdpVerifier,
    pool: &PgPool,
    strategy: Strategy,
) -> Result<Authenticated, Response> {
    let decision = authenticate_request(path, headers, verifier, pool, strategy)
        .await
        .map_err(|err| {
            error!("authentication lookup failed: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?;

    match decision {
        AuthDecision::Allow(auth) => Ok(auth),
        AuthDecision::Deny(reason) => {
            warn!(%reason, path, "request denied");
            Err(invalid_token_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::testing::TEST_PRIVATE_KEY_PEM;
    use crate::idp::Jwks;
    use anyhow::Result;
    use axum::body::to_bytes;
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
    use sqlx::postgres::PgPoolOptions;

    fn verifier() -> Result<IdpVerifier> {
        let jwks = Jwks::from_rsa_private_key_pem_or_der(TEST_PRIVATE_KEY_PEM.as_bytes(), "k1")?;
        Ok(IdpVerifier::new(jwks, "hub-client-id".to_string()))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/hub")?)
    }

    async fn body_json(response: Response) -> Result<serde_json::Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn every_denial_collapses_to_the_generic_body() -> Result<()> {
        // Missing header, unsupported scheme, and invalid bearer token fail
        // at different stages but must be indistinguishable to the client.
        let cases: [Option<&'static str>; 3] = [
            None,
            Some("Basic xyz"),
            Some("Bearer not-a-real-token"),
        ];

        for case in cases {
            let mut headers = HeaderMap::new();
            if let Some(value) = case {
                headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
            }
            let result = authorized_user_required(
                "/v1/authentication/users",
                &headers,
                &verifier()?,
                &lazy_pool()?,
                Capability::Standard,
            )
            .await;

            let response = result.err().expect("denial expected");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await?;
            assert_eq!(body, serde_json::json!({"error": "Invalid Token"}));
        }
        Ok(())
    }

    #[tokio::test]
    async fn idp_guard_collapses_failures_the_same_way() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token opaque"));
        let result = idp_user_required(
            "/v1/api/santander/credentials",
            &headers,
            &verifier()?,
            &lazy_pool()?,
        )
        .await;

        let response = result.err().expect("denial expected");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await?;
        assert_eq!(body, serde_json::json!({"error": "Invalid Token"}));
        Ok(())
    }

    #[tokio::test]
    async fn upload_path_without_session_is_denied_generically() -> Result<()> {
        let result = authorized_user_required(
            "/v1/api/tievolucion/staff/upload/",
            &HeaderMap::new(),
            &verifier()?,
            &lazy_pool()?,
            Capability::Standard,
        )
        .await;

        let response = result.err().expect("denial expected");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
