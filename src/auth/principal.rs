//! Resolved identities attached to a request after authentication.

use uuid::Uuid;

/// Stored authorization booleans, read as one snapshot at decision time.
/// Never cached across requests; flags can change between requests through
/// the management endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationFlags {
    pub is_active: bool,
    pub is_authorized: bool,
    pub can_manage_users: bool,
}

/// Role of a person in the university records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonRole {
    Student,
    Services,
    Professor,
    Tester,
}

impl PersonRole {
    /// Parse the stored role value, falling back to `Tester` like the
    /// partner serializers do for unknown roles.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "student" => Self::Student,
            "services" => Self::Services,
            "professor" => Self::Professor,
            _ => Self::Tester,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Services => "services",
            Self::Professor => "professor",
            Self::Tester => "tester",
        }
    }

    /// Spanish display name used by the partner-credential payload.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Student => "Estudiante",
            Self::Services => "Servicio",
            Self::Professor => "Profesor",
            Self::Tester => "tester",
        }
    }
}

/// Account-backed principal resolved by the hybrid or opaque-token paths.
///
/// `flags` is `None` when the account has no authorization record at all;
/// the gate treats that as not authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPrincipal {
    pub user_id: Uuid,
    pub email: String,
    pub flags: Option<AuthorizationFlags>,
}

/// Profile-backed principal resolved on the identity-provider path.
///
/// Exposes only the fields consumed downstream instead of forwarding
/// arbitrary attribute access to the underlying record. Authenticated but
/// deliberately unauthorized: this path never checks account flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePrincipal {
    pub person_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub second_last_name: String,
    pub role: PersonRole,
    pub photo: Option<String>,
    pub institutional_email: String,
    pub phone: Option<String>,
}

impl ProfilePrincipal {
    /// Whether the profile carries enough contact data for the partner
    /// payload. Incomplete profiles are reported as "no content".
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.phone.is_some()
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.last_name, self.second_last_name
        )
        .trim_end()
        .to_string()
    }
}

/// Anonymous principal bound to a web upload session. Authorization is
/// implicit in the session flag; no account is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPrincipal {
    pub session_key: String,
    pub role: String,
}

/// The resolved identity attached to a request after successful
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Account(AccountPrincipal),
    Profile(ProfilePrincipal),
    WebSession(SessionPrincipal),
}

impl Principal {
    /// Snapshot of the stored authorization flags for account-backed
    /// principals. Profile and session principals carry none.
    #[must_use]
    pub fn authorization_flags(&self) -> Option<&AuthorizationFlags> {
        match self {
            Self::Account(account) => account.flags.as_ref(),
            Self::Profile(_) | Self::WebSession(_) => None,
        }
    }

    /// Email associated with the principal, when one exists.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Account(account) => Some(&account.email),
            Self::Profile(profile) => Some(&profile.institutional_email),
            Self::WebSession(_) => None,
        }
    }
}
