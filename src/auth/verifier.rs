//! Bearer-token verification against the identity provider.

use tracing::warn;

use crate::auth::error::AuthFailureKind;
use crate::idp::IdpVerifier;

/// Issuer strings accepted for provider ID tokens, covering both the short
/// and fully-qualified forms the provider emits.
pub const ACCEPTED_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity claimed by a verified bearer token. Request-scoped; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaim {
    pub subject_email: String,
    pub issuer: String,
}

/// Verify a bearer token and extract the institutional email it claims.
///
/// Decode, signature, audience, and expiry problems are collapsed into a
/// single `InvalidToken` failure; the issuer allow-list and missing-email
/// rejections keep their own messages. No normalization is applied to the
/// extracted email.
///
/// # Errors
///
/// `InvalidToken` for every failure mode of this stage.
pub async fn verify_bearer(
    verifier: &IdpVerifier,
    token: &str,
) -> Result<VerifiedClaim, AuthFailureKind> {
    let claims = match verifier.verify(token).await {
        Ok(claims) => claims,
        Err(err) => {
            warn!("Authentication failed: invalid token: {err}");
            return Err(AuthFailureKind::InvalidToken("Invalid token.".to_string()));
        }
    };

    if !ACCEPTED_ISSUERS.contains(&claims.iss.as_str()) {
        return Err(AuthFailureKind::InvalidToken(
            "Invalid token issuer.".to_string(),
        ));
    }

    match claims.email {
        Some(email) if !email.is_empty() => Ok(VerifiedClaim {
            subject_email: email,
            issuer: claims.iss,
        }),
        _ => Err(AuthFailureKind::InvalidToken(
            "The token does not contain a valid email.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::testing::TEST_PRIVATE_KEY_PEM;
    use crate::idp::{sign_rs256, IdTokenClaims, Jwks};
    use anyhow::Result;
    use std::time::{SystemTime, UNIX_EPOCH};

    const AUDIENCE: &str = "hub-client-id";

    fn now_unix() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    fn verifier() -> Result<IdpVerifier> {
        let jwks = Jwks::from_rsa_private_key_pem_or_der(TEST_PRIVATE_KEY_PEM.as_bytes(), "k1")?;
        Ok(IdpVerifier::new(jwks, AUDIENCE.to_string()))
    }

    fn signed_token(iss: &str, email: Option<&str>, exp: i64) -> Result<String> {
        let claims = IdTokenClaims {
            iss: iss.to_string(),
            aud: AUDIENCE.to_string(),
            iat: exp - 3600,
            exp,
            sub: Some("subject".to_string()),
            email: email.map(str::to_string),
        };
        Ok(sign_rs256(TEST_PRIVATE_KEY_PEM.as_bytes(), "k1", &claims)?)
    }

    #[tokio::test]
    async fn valid_token_yields_exactly_the_claimed_email() -> Result<()> {
        let verifier = verifier()?;
        for issuer in ACCEPTED_ISSUERS {
            let token = signed_token(issuer, Some("a@uvaq.edu.mx"), now_unix() + 3600)?;
            let claim = verify_bearer(&verifier, &token)
                .await
                .expect("token should verify");
            assert_eq!(claim.subject_email, "a@uvaq.edu.mx");
            assert_eq!(claim.issuer, issuer);
        }
        Ok(())
    }

    #[tokio::test]
    async fn foreign_issuer_fails_even_with_valid_signature() -> Result<()> {
        let verifier = verifier()?;
        let token = signed_token(
            "https://accounts.example.com",
            Some("a@uvaq.edu.mx"),
            now_unix() + 3600,
        )?;
        let err = verify_bearer(&verifier, &token).await.unwrap_err();
        assert_eq!(
            err,
            AuthFailureKind::InvalidToken("Invalid token issuer.".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_empty_email_is_rejected() -> Result<()> {
        let verifier = verifier()?;
        for email in [None, Some("")] {
            let token = signed_token("accounts.google.com", email, now_unix() + 3600)?;
            let err = verify_bearer(&verifier, &token).await.unwrap_err();
            assert_eq!(
                err,
                AuthFailureKind::InvalidToken(
                    "The token does not contain a valid email.".to_string()
                )
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn email_case_is_preserved_on_token_paths() -> Result<()> {
        // The login exchange lower-cases before lookup; the token paths do
        // not. A mixed-case email claim therefore only resolves against a
        // record stored with the same casing. Inherited inconsistency,
        // pinned here on purpose.
        let verifier = verifier()?;
        let token = signed_token(
            "accounts.google.com",
            Some("Ana.Garcia@UVAQ.edu.MX"),
            now_unix() + 3600,
        )?;
        let claim = verify_bearer(&verifier, &token).await.expect("verifies");
        assert_eq!(claim.subject_email, "Ana.Garcia@UVAQ.edu.MX");
        Ok(())
    }

    #[tokio::test]
    async fn expiry_and_garbage_collapse_to_generic_invalid_token() -> Result<()> {
        let verifier = verifier()?;
        let expired = signed_token("accounts.google.com", Some("a@uvaq.edu.mx"), now_unix() - 10)?;
        for token in [expired.as_str(), "garbage"] {
            let err = verify_bearer(&verifier, token).await.unwrap_err();
            assert_eq!(
                err,
                AuthFailureKind::InvalidToken("Invalid token.".to_string())
            );
        }
        Ok(())
    }
}
