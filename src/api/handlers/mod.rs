//! API handlers and shared helpers.

pub mod authorized_users;
pub mod credentials;
pub mod health;
pub mod login;
pub(crate) mod storage;
pub mod types;
pub mod uploads;

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;

/// Lightweight email sanity check used before persisting account data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Normalize an email for the login exchange.
///
/// Token-path lookups deliberately do NOT normalize; only the login
/// endpoint trims and lower-cases before matching. See the discrepancy
/// test in the login handler.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password into a PHC string for storage.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .context("failed to generate salt")?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against a stored PHC hash. Unparseable hashes fail
/// closed.
pub(crate) fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@uvaq.edu.mx"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@UVAQ.edu.MX "), "alice@uvaq.edu.mx");
    }

    #[test]
    fn password_round_trip() -> Result<()> {
        let hash = hash_password("hunter2")?;
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        Ok(())
    }

    #[test]
    fn verify_password_fails_closed_on_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "hunter2"));
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let first = hash_password("hunter2")?;
        let second = hash_password("hunter2")?;
        assert_ne!(first, second);
        Ok(())
    }
}
