//! Login exchange: email + password for an opaque API token.
//!
//! Unlike the guarded endpoints, failures here keep distinct status codes:
//! this endpoint is not behind the generic guard, and clients rely on the
//! difference between unknown email, bad password, and missing
//! authorization.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::ExposeSecret;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use super::storage::{get_or_create_token, lookup_login_record};
use super::types::{LoginRequest, LoginResponse};
use super::{normalize_email, verify_password};

#[utoipa::path(
    post,
    path = "/v1/authentication/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, token issued or reused", body = LoginResponse),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "User is not authorized"),
        (status = 404, description = "Unknown email or no authorization record"),
    ),
    tag = "authentication"
)]
pub async fn login(
    pool: Extension<PgPool>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // The login exchange normalizes; the token paths match exactly. This
    // asymmetry is inherited behavior, kept on purpose.
    let email = normalize_email(&request.email);

    let record = match lookup_login_record(&pool, &email).await {
        Ok(record) => record,
        Err(err) => {
            error!("Login lookup failed: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(record) = record else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found with this email"})),
        )
            .into_response();
    };

    if !verify_password(&record.password_hash, request.password.expose_secret()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid credentials"})),
        )
            .into_response();
    }

    let Some(flags) = record.flags else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found in the authorized users database"})),
        )
            .into_response();
    };

    if !flags.is_authorized {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "User is not authorized"})),
        )
            .into_response();
    }

    match get_or_create_token(&pool, record.user_id).await {
        Ok(token) => (StatusCode::OK, Json(LoginResponse { token })).into_response(),
        Err(err) => {
            error!("Token issuance failed: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/hub")?;
        let response = login(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
