//! Partner credential bridge.
//!
//! The banking partner authenticates end users with provider ID tokens and
//! pulls a profile-shaped payload keyed by institutional email. This route
//! is identity-provider-guarded only; no account flags are involved.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::guard::{idp_user_required, invalid_token_response};
use crate::auth::{Principal, ProfilePrincipal};
use crate::idp::IdpVerifier;

#[derive(Debug, Serialize, ToSchema)]
pub struct PersonName {
    #[serde(rename = "givenName")]
    pub given_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "secondLastName")]
    pub second_last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactPoint {
    pub telephone: Option<String>,
    #[serde(rename = "emailAddress")]
    pub email_address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleName {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PersonPayload {
    #[serde(rename = "personName")]
    pub person_name: PersonName,
    #[serde(rename = "contactPoint")]
    pub contact_point: ContactPoint,
    pub role: RoleName,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PartnerCredential {
    pub person: PersonPayload,
}

#[utoipa::path(
    get,
    path = "/v1/api/santander/credentials",
    responses(
        (status = 200, description = "Partner credential payload", body = PartnerCredential),
        (status = 204, description = "User found but the profile has no content"),
        (status = 401, description = "Authentication failed"),
    ),
    tag = "santander"
)]
pub async fn credentials(
    uri: Uri,
    headers: HeaderMap,
    verifier: Extension<Arc<IdpVerifier>>,
    pool: Extension<PgPool>,
) -> Response {
    let auth = match idp_user_required(uri.path(), &headers, &verifier, &pool).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    // The IdP dispatch always yields a profile principal on this route.
    let Principal::Profile(profile) = auth.principal else {
        return invalid_token_response();
    };

    if !profile.has_content() {
        return StatusCode::NO_CONTENT.into_response();
    }

    (StatusCode::OK, Json(partner_credential(&profile))).into_response()
}

fn partner_credential(profile: &ProfilePrincipal) -> PartnerCredential {
    PartnerCredential {
        person: PersonPayload {
            person_name: PersonName {
                given_name: profile.first_name.clone(),
                last_name: profile.last_name.clone(),
                second_last_name: profile.second_last_name.clone(),
            },
            contact_point: ContactPoint {
                telephone: profile.phone.as_deref().map(format_phone),
                email_address: profile.institutional_email.clone(),
            },
            role: RoleName {
                name: profile.role.display_name().to_string(),
            },
        },
    }
}

/// Format a bare 10-digit phone as `(xxx) xxx xxxx`; anything else passes
/// through untouched.
fn format_phone(phone: &str) -> String {
    let Ok(pattern) = Regex::new(r"^(\d{3})(\d{3})(\d{4})") else {
        return phone.to_string();
    };
    match pattern.captures(phone) {
        Some(groups) => format!("({}) {} {}", &groups[1], &groups[2], &groups[3]),
        None => phone.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PersonRole;
    use anyhow::Result;

    fn profile() -> ProfilePrincipal {
        ProfilePrincipal {
            person_id: 7,
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            second_last_name: "López".to_string(),
            role: PersonRole::Student,
            photo: None,
            institutional_email: "ana@uvaq.edu.mx".to_string(),
            phone: Some("4431234567".to_string()),
        }
    }

    #[test]
    fn format_phone_groups_ten_digits() {
        assert_eq!(format_phone("4431234567"), "(443) 123 4567");
        assert_eq!(format_phone("not-a-phone"), "not-a-phone");
        assert_eq!(format_phone("123"), "123");
    }

    #[test]
    fn payload_uses_partner_field_names() -> Result<()> {
        let value = serde_json::to_value(partner_credential(&profile()))?;
        assert_eq!(
            value,
            serde_json::json!({
                "person": {
                    "personName": {
                        "givenName": "Ana",
                        "lastName": "García",
                        "secondLastName": "López",
                    },
                    "contactPoint": {
                        "telephone": "(443) 123 4567",
                        "emailAddress": "ana@uvaq.edu.mx",
                    },
                    "role": {"name": "Estudiante"},
                }
            })
        );
        Ok(())
    }

    #[test]
    fn profiles_without_contact_data_have_no_content() {
        let mut incomplete = profile();
        incomplete.phone = None;
        assert!(!incomplete.has_content());
        assert!(profile().has_content());
    }
}
