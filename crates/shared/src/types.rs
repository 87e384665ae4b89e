//! Common types used across GymKeep

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ParseRoleError;

/// Minimum accepted email length (after normalization)
pub const EMAIL_MIN_LEN: usize = 6;
/// Maximum accepted email length (after normalization)
pub const EMAIL_MAX_LEN: usize = 320;
/// Minimum display name length
pub const NAME_MIN_LEN: usize = 3;
/// Maximum display name length
pub const NAME_MAX_LEN: usize = 50;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Principal ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PrincipalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// The four principal types. Each role has its own login namespace and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Member,
    Trainer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Member, Role::Trainer];

    /// Lowercase tag used in URLs, token claims and response keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
            Role::Trainer => "trainer",
        }
    }

    /// Capitalized form used in user-facing messages
    pub fn title(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Member => "Member",
            Role::Trainer => "Trainer",
        }
    }

    /// Backing table for the PostgreSQL store
    pub fn table(&self) -> &'static str {
        match self {
            Role::Admin => "admins",
            Role::Manager => "managers",
            Role::Member => "members",
            Role::Trainer => "trainers",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "member" => Ok(Role::Member),
            "trainer" => Ok(Role::Trainer),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

// =============================================================================
// Principal
// =============================================================================

/// An authenticatable entity of one role.
///
/// `refresh_token` holds exactly the most recently issued refresh token, or
/// `None` when no session is active. It is written only through the session
/// methods of [`crate::PrincipalStore`]; `save` never touches it.
#[derive(Clone)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Principal {
    /// Public projection with credential and session fields stripped
    pub fn profile(&self) -> PrincipalProfile {
        PrincipalProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// The only principal shape ever serialized to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalProfile {
    pub id: PrincipalId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Data required to create a principal. The password is already hashed.
#[derive(Clone)]
pub struct NewPrincipal {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Lowercase and trim an email so lookups and uniqueness are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_principal() -> Principal {
        let now = OffsetDateTime::now_utc();
        Principal {
            id: PrincipalId::new(),
            role: Role::Trainer,
            name: "Sam Lifter".to_string(),
            email: "sam@gym.test".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            refresh_token: Some("refresh.token.value".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(" Manager ".parse::<Role>().unwrap(), Role::Manager);
        assert!("coach".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Trainer).unwrap(), "\"trainer\"");
        assert_eq!(Role::Member.table(), "members");
        assert_eq!(Role::Admin.title(), "Admin");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn test_profile_strips_credentials() {
        let principal = sample_principal();
        let json = serde_json::to_value(principal.profile()).unwrap();

        assert_eq!(json["email"], "sam@gym.test");
        assert_eq!(json["role"], "trainer");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("refreshToken").is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let principal = sample_principal();
        let debug = format!("{:?}", principal);

        assert!(!debug.contains("argon2id"));
        assert!(!debug.contains("refresh.token.value"));
        assert!(debug.contains("[redacted]"));
    }
}
