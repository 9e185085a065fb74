//! Raw credential material presented by a caller.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::error::AuthFailureKind;

/// The credential carried by one request. Immutable; constructed once per
/// request from the `Authorization` header (or, for web upload flows, from
/// the session cookie — see `web_flow`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Externally issued signed ID token.
    Bearer(String),
    /// Internally minted opaque token, looked up verbatim.
    OpaqueToken(String),
    /// Server-side session reference for web upload flows.
    SessionRef { session_key: String, role: String },
}

impl Credential {
    /// Parse the `Authorization` header into a credential.
    ///
    /// The scheme is matched case-insensitively; everything after the first
    /// space is the token, kept verbatim.
    ///
    /// # Errors
    ///
    /// `MissingHeader` when no header is present, `MalformedHeader` when it
    /// cannot be split into scheme and token, `UnsupportedScheme` for any
    /// scheme other than `bearer` or `token`.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthFailureKind> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Err(AuthFailureKind::MissingHeader);
        };
        let value = value
            .to_str()
            .map_err(|_| AuthFailureKind::MalformedHeader)?;
        let (scheme, token) = value
            .split_once(' ')
            .ok_or(AuthFailureKind::MalformedHeader)?;

        match scheme.to_lowercase().as_str() {
            "bearer" => Ok(Self::Bearer(token.to_string())),
            "token" => Ok(Self::OpaqueToken(token.to_string())),
            _ => Err(AuthFailureKind::UnsupportedScheme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn missing_header_is_distinct_from_malformed() {
        assert_eq!(
            Credential::from_headers(&HeaderMap::new()),
            Err(AuthFailureKind::MissingHeader)
        );
        assert_eq!(
            Credential::from_headers(&headers_with("Bearer")),
            Err(AuthFailureKind::MalformedHeader)
        );
    }

    #[test]
    fn scheme_is_case_insensitive() {
        for value in ["Bearer abc", "bearer abc", "BEARER abc"] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("ascii"));
            assert_eq!(
                Credential::from_headers(&headers),
                Ok(Credential::Bearer("abc".to_string()))
            );
        }
        assert_eq!(
            Credential::from_headers(&headers_with("Token secret")),
            Ok(Credential::OpaqueToken("secret".to_string()))
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert_eq!(
            Credential::from_headers(&headers_with("Basic xyz")),
            Err(AuthFailureKind::UnsupportedScheme)
        );
        assert_eq!(
            Credential::from_headers(&headers_with("Digest a=b")),
            Err(AuthFailureKind::UnsupportedScheme)
        );
    }

    #[test]
    fn token_is_kept_verbatim_after_first_space() {
        assert_eq!(
            Credential::from_headers(&headers_with("Bearer a.b.c extra")),
            Ok(Credential::Bearer("a.b.c extra".to_string()))
        );
    }
}
