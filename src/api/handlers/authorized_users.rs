//! Authorized-user management endpoints.
//!
//! Flow Overview:
//! 1) Authenticate through the hybrid guard (bearer or opaque token).
//! 2) Reads require the standard capability; writes additionally check the
//!    manage capability explicitly in the handler.
//! 3) Deletion is soft: records are marked inactive, never removed.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::storage::{
    deactivate_authorized_user, fetch_authorized_user, insert_authorized_user,
    list_active_authorized_users, InsertOutcome,
};
use super::types::{AuthorizedUserRequest, AuthorizedUserResponse, AuthorizedUserUpdateRequest};
use super::{hash_password, valid_email};
use crate::auth::guard::{authorized_user_required, invalid_token_response};
use crate::auth::{gate, Capability};
use crate::idp::IdpVerifier;

#[utoipa::path(
    get,
    path = "/v1/authentication/users",
    responses(
        (status = 200, description = "Active authorized users", body = [AuthorizedUserResponse]),
        (status = 401, description = "Authentication or authorization failed"),
    ),
    tag = "authentication"
)]
pub async fn list_authorized_users(
    uri: Uri,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
) -> Response {
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

    match list_active_authorized_users(&pool).await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => {
            error!("Failed to list authorized users: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/authentication/users/{id}",
    params(
        ("id" = i64, Path, description = "Authorized user record id")
    ),
    responses(
        (status = 200, description = "Authorized user detail", body = AuthorizedUserResponse),
        (status = 401, description = "Authentication or authorization failed"),
        (status = 404, description = "No such record"),
    ),
    tag = "authentication"
)]
pub async fn retrieve_authorized_user(
    uri: Uri,
    Path(id): Path<i64>,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
) -> Response {
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

    match fetch_authorized_user(&pool, id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch authorized user: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/authentication/users",
    request_body = AuthorizedUserRequest,
    responses(
        (status = 201, description = "Authorized user created", body = AuthorizedUserResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Authentication or authorization failed"),
    ),
    tag = "authentication"
)]
pub async fn create_authorized_user(
    uri: Uri,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
    payload: Option<Json<AuthorizedUserRequest>>,
) -> Response {
    let auth = match authorized_user_required(
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

    // Creating accounts requires the manage capability; checked here, in
    // the handler, against the same snapshot the guard used.
    if gate::check(auth.principal.authorization_flags(), Capability::ManageOthers).is_err() {
        return invalid_token_response();
    }

    let request: AuthorizedUserRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_email(&request.user.email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let password_hash = match hash_password(request.user.password.expose_secret()) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match insert_authorized_user(&pool, &request, &password_hash).await {
        Ok(InsertOutcome::Created(user)) => (StatusCode::CREATED, Json(user)).into_response(),
        Ok(InsertOutcome::Conflict) => (
            StatusCode::BAD_REQUEST,
            "This email or username is already in use.".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create authorized user: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/authentication/users/{id}",
    params(
        ("id" = i64, Path, description = "Authorized user record id")
    ),
    request_body = AuthorizedUserUpdateRequest,
    responses(
        (status = 200, description = "Authorized user updated", body = AuthorizedUserResponse),
        (status = 401, description = "Authentication or authorization failed"),
        (status = 404, description = "No such record"),
    ),
    tag = "authentication"
)]
pub async fn update_authorized_user(
    uri: Uri,
    Path(id): Path<i64>,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
    payload: Option<Json<AuthorizedUserUpdateRequest>>,
) -> Response {
    let auth = match authorized_user_required(
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

    if gate::check(auth.principal.authorization_flags(), Capability::ManageOthers).is_err() {
        return invalid_token_response();
    }

    let changes: AuthorizedUserUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if let Some(email) = changes.user.as_ref().and_then(|user| user.email.as_deref()) {
        if !valid_email(email) {
            return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
        }
    }

    let password_hash = match changes
        .user
        .as_ref()
        .and_then(|user| user.password.as_ref())
        .map(|password| hash_password(password.expose_secret()))
        .transpose()
    {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match super::storage::update_authorized_user(&pool, id, &changes, password_hash.as_deref()).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update authorized user: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/authentication/users/{id}",
    params(
        ("id" = i64, Path, description = "Authorized user record id")
    ),
    responses(
        (status = 204, description = "Authorized user deactivated"),
        (status = 401, description = "Authentication or authorization failed"),
        (status = 404, description = "No such record"),
    ),
    tag = "authentication"
)]
pub async fn destroy_authorized_user(
    uri: Uri,
    Path(id): Path<i64>,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
) -> Response {
    let auth = match authorized_user_required(
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

    if gate::check(auth.principal.authorization_flags(), Capability::ManageOthers).is_err() {
        return invalid_token_response();
    }

    match deactivate_authorized_user(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to deactivate authorized user: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
