//! Hybrid authentication and authorization.
//!
//! Two credential families are accepted transparently: bearer ID tokens
//! issued by the external identity provider, and opaque API tokens minted by
//! the login exchange. A declared scheme in the `Authorization` header
//! selects the verification path; a secondary authorization gate over stored
//! account flags is enforced independently of authentication success.
//!
//! Web CSV-upload flows under `/v1/api/tievolucion/.../upload/` bypass the
//! token pipeline entirely in favor of a server-side session flag; that
//! check always runs first.
//!
//! Every stage returns a typed result instead of raising; the request guards
//! collapse all failure reasons into one generic client-facing 401 so the
//! response does not leak which check failed.

pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod guard;
pub mod principal;
pub mod resolver;
pub(crate) mod store;
pub mod verifier;
pub mod web_flow;

pub use config::AuthConfig;
pub use credential::Credential;
pub use dispatcher::{authenticate_request, AuthDecision, Authenticated, Dispatcher, Strategy};
pub use error::AuthFailureKind;
pub use gate::Capability;
pub use principal::{
    AccountPrincipal, AuthorizationFlags, PersonRole, Principal, ProfilePrincipal,
    SessionPrincipal,
};
pub use verifier::{VerifiedClaim, ACCEPTED_ISSUERS};
