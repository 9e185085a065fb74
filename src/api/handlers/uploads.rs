//! Web CSV-upload endpoints.
//!
//! Authentication is the session-flag bypass, never tokens. The handler
//! only acknowledges receipt; cleaning and ingestion happen in the CSV
//! tooling that consumes the uploaded file.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::types::UploadReceipt;
use crate::auth::guard::authorized_user_required;
use crate::auth::Capability;
use crate::idp::IdpVerifier;

#[utoipa::path(
    post,
    path = "/v1/api/tievolucion/{role}/upload/",
    params(
        ("role" = String, Path, description = "Upload role: staff, professor, or student")
    ),
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 202, description = "Upload accepted", body = UploadReceipt),
        (status = 401, description = "Web authentication required"),
    ),
    tag = "tievolucion"
)]
pub async fn upload(
    uri: Uri,
    Path(role): Path<String>,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
    body: String,
) -> Response {
    // Matching paths route through the session bypass inside the guard.
    let _auth = match authorized_user_required(
        uri.path(),
        &headers,
        &verifier,
        &pool,
        Capability::Standard,
    )
    .await
    {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    let rows = body.lines().filter(|line| !line.trim().is_empty()).count();
    info!(role = %role, rows, "accepted csv upload");

    (StatusCode::ACCEPTED, Json(UploadReceipt { role, rows })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::testing::TEST_PRIVATE_KEY_PEM;
    use crate::idp::Jwks;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    fn verifier() -> Result<Arc<IdpVerifier>> {
        let jwks = Jwks::from_rsa_private_key_pem_or_der(TEST_PRIVATE_KEY_PEM.as_bytes(), "k1")?;
        Ok(Arc::new(IdpVerifier::new(jwks, "hub-client-id".to_string())))
    }

    #[tokio::test]
    async fn upload_without_session_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/hub")?;
        let response = upload(
            Uri::from_static("/v1/api/tievolucion/staff/upload/"),
            Path("staff".to_string()),
            HeaderMap::new(),
            Extension(verifier()?),
            Extension(pool),
            "name,employee_id\n".to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn upload_ignores_authorization_header_in_favor_of_session() -> Result<()> {
        // A bogus bearer token must not even be looked at on upload paths;
        // the bypass answers first with its own failure.
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/hub")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer bogus"),
        );
        let response = upload(
            Uri::from_static("/v1/api/tievolucion/student/upload/"),
            Path("student".to_string()),
            headers,
            Extension(verifier()?),
            Extension(pool),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
