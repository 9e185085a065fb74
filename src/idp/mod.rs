//! Identity-provider token handling.
//!
//! Bearer tokens issued by the external identity provider are RS256-signed
//! ID tokens. Verification happens offline against the provider's published
//! JWKS, which is cached in memory and refreshed on expiry or when a token
//! arrives with an unknown `kid`.

mod id_token;
mod jwks;
mod keyset;
#[cfg(test)]
pub(crate) mod testing;

pub use id_token::{sign_rs256, verify_rs256, Error, IdTokenClaims};
pub use jwks::{Jwk, Jwks};
pub use keyset::IdpVerifier;
