//! Session-based bypass for web CSV-upload flows.
//!
//! A narrow, path-matched set of upload routes skips the token pipeline: if
//! the request's session carries a `{role}_authenticated` flag, it proceeds
//! as an anonymous session-bound principal. The role is taken from the URL
//! path, the session key from the `hub_session` cookie.

use axum::http::{header::COOKIE, HeaderMap};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::auth::credential::Credential;
use crate::auth::dispatcher::{AuthDecision, Authenticated};
use crate::auth::error::AuthFailureKind;
use crate::auth::principal::{Principal, SessionPrincipal};
use crate::auth::store;

pub const SESSION_COOKIE_NAME: &str = "hub_session";

const UPLOAD_PATH_MARKER: &str = "/v1/api/tievolucion/";

/// Whether a request path belongs to the web upload flows that skip token
/// authentication.
#[must_use]
pub fn bypasses_token_auth(path: &str) -> bool {
    path.contains(UPLOAD_PATH_MARKER) && path.contains("upload")
}

/// Extract the upload role from the path. The role is the 5th
/// `/`-separated segment: `/v1/api/tievolucion/{role}/upload/`.
#[must_use]
pub fn upload_role(path: &str) -> Option<&str> {
    path.split('/').nth(4).filter(|segment| !segment.is_empty())
}

/// Build the session credential for an upload request, when the path names
/// a role and the session cookie is present.
#[must_use]
pub fn session_credential(path: &str, headers: &HeaderMap) -> Option<Credential> {
    let role = upload_role(path)?;
    let session_key = session_key_from_headers(headers)?;
    Some(Credential::SessionRef {
        session_key,
        role: role.to_string(),
    })
}

/// Authenticate an upload request from session state alone.
///
/// # Errors
///
/// Only store errors surface as `Err`; a missing or unflagged session is a
/// `Deny(WebAuthRequired)` decision.
pub async fn authenticate(
    path: &str,
    headers: &HeaderMap,
    pool: &PgPool,
) -> anyhow::Result<AuthDecision> {
    debug!(path, "bypassing token auth for web upload");

    let Some(Credential::SessionRef { session_key, role }) = session_credential(path, headers)
    else {
        warn!(path, "web auth required for upload");
        return Ok(AuthDecision::Deny(AuthFailureKind::WebAuthRequired));
    };

    let flag = format!("{role}_authenticated");
    if store::web_session_flag_set(pool, &session_key, &flag).await? {
        info!("session auth valid for {role} upload");
        Ok(AuthDecision::Allow(Authenticated {
            principal: Principal::WebSession(SessionPrincipal { session_key, role }),
            credential: None,
        }))
    } else {
        warn!("web auth required for {role} upload");
        Ok(AuthDecision::Deny(AuthFailureKind::WebAuthRequired))
    }
}

fn session_key_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn only_upload_paths_bypass() {
        assert!(bypasses_token_auth("/v1/api/tievolucion/staff/upload/"));
        assert!(bypasses_token_auth(
            "/v1/api/tievolucion/professor/upload/confirm/"
        ));
        assert!(!bypasses_token_auth("/v1/api/tievolucion/staff/list/"));
        assert!(!bypasses_token_auth("/v1/api/santander/credentials"));
        assert!(!bypasses_token_auth("/v1/authentication/users"));
    }

    #[test]
    fn role_is_the_fifth_path_segment() {
        assert_eq!(
            upload_role("/v1/api/tievolucion/staff/upload/"),
            Some("staff")
        );
        assert_eq!(
            upload_role("/v1/api/tievolucion/student/upload/"),
            Some("student")
        );
        assert_eq!(
            upload_role("/v1/api/tievolucion/professor/upload/"),
            Some("professor")
        );
        assert_eq!(upload_role("/v1/api/tievolucion/"), None);
    }

    #[test]
    fn session_credential_binds_role_and_session_key() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("hub_session=abc123"));
        assert_eq!(
            session_credential("/v1/api/tievolucion/staff/upload/", &headers),
            Some(Credential::SessionRef {
                session_key: "abc123".to_string(),
                role: "staff".to_string(),
            })
        );
        assert_eq!(
            session_credential("/v1/api/tievolucion/staff/upload/", &HeaderMap::new()),
            None
        );
    }

    #[test]
    fn session_key_comes_from_the_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; hub_session=abc123; lang=es"),
        );
        assert_eq!(
            session_key_from_headers(&headers),
            Some("abc123".to_string())
        );

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_key_from_headers(&headers), None);
        assert_eq!(session_key_from_headers(&HeaderMap::new()), None);
    }
}
