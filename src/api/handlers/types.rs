//! Request/response types for the authentication endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UserPayload {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct UserUpdatePayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    #[schema(value_type = Option<String>)]
    pub password: Option<SecretString>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct AuthorizedUserRequest {
    pub user: UserPayload,
    #[serde(default)]
    pub is_authorized: bool,
    #[serde(default)]
    pub can_manage_users: bool,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct AuthorizedUserUpdateRequest {
    pub user: Option<UserUpdatePayload>,
    pub is_authorized: Option<bool>,
    pub can_manage_users: Option<bool>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct UserSummary {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AuthorizedUserResponse {
    pub id: i64,
    pub user: UserSummary,
    pub is_authorized: bool,
    pub can_manage_users: bool,
    pub date_joined: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct UploadReceipt {
    pub role: String,
    pub rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use secrecy::ExposeSecret;

    #[test]
    fn login_request_deserializes_and_redacts_password() -> Result<()> {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "a@uvaq.edu.mx",
            "password": "hunter2",
        }))?;
        assert_eq!(request.email, "a@uvaq.edu.mx");
        assert_eq!(request.password.expose_secret(), "hunter2");
        // Debug output must not leak the password.
        assert!(!format!("{request:?}").contains("hunter2"));
        Ok(())
    }

    #[test]
    fn authorized_user_request_flags_default_to_false() -> Result<()> {
        let request: AuthorizedUserRequest = serde_json::from_value(serde_json::json!({
            "user": {
                "first_name": "Ana",
                "last_name": "García",
                "username": "agarcia",
                "email": "ana@uvaq.edu.mx",
                "password": "hunter2",
            },
        }))?;
        assert!(!request.is_authorized);
        assert!(!request.can_manage_users);
        Ok(())
    }

    #[test]
    fn update_request_accepts_partial_bodies() -> Result<()> {
        let request: AuthorizedUserUpdateRequest = serde_json::from_value(serde_json::json!({
            "is_authorized": true,
        }))?;
        assert_eq!(request.is_authorized, Some(true));
        assert!(request.can_manage_users.is_none());
        assert!(request.user.is_none());
        Ok(())
    }

    #[test]
    fn login_response_round_trips() -> Result<()> {
        let response = LoginResponse {
            token: "opaque".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value, serde_json::json!({"token": "opaque"}));
        Ok(())
    }
}
