//! OpenAPI document served through Swagger UI at `/v1/docs`.

use utoipa::OpenApi;

use crate::api::handlers::credentials::{
    ContactPoint, PartnerCredential, PersonName, PersonPayload, RoleName,
};
use crate::api::handlers::types::{
    AuthorizedUserRequest, AuthorizedUserResponse, AuthorizedUserUpdateRequest, LoginRequest,
    LoginResponse, UploadReceipt, UserPayload, UserSummary, UserUpdatePayload,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "UVAQ",
        description = "API for the Universal Application Connection Hub"
    ),
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::login::login,
        crate::api::handlers::authorized_users::list_authorized_users,
        crate::api::handlers::authorized_users::create_authorized_user,
        crate::api::handlers::authorized_users::retrieve_authorized_user,
        crate::api::handlers::authorized_users::update_authorized_user,
        crate::api::handlers::authorized_users::destroy_authorized_user,
        crate::api::handlers::credentials::credentials,
        crate::api::handlers::uploads::upload,
    ),
    components(schemas(
        LoginRequest,
        LoginResponse,
        UserPayload,
        UserUpdatePayload,
        UserSummary,
        AuthorizedUserRequest,
        AuthorizedUserUpdateRequest,
        AuthorizedUserResponse,
        UploadReceipt,
        PartnerCredential,
        PersonPayload,
        PersonName,
        ContactPoint,
        RoleName,
    )),
    tags(
        (name = "authentication", description = "Login exchange and authorized-user management"),
        (name = "santander", description = "Partner credential bridge"),
        (name = "tievolucion", description = "Web CSV-upload flows"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
