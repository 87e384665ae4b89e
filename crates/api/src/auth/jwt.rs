//! JWT token generation and validation
//!
//! Two independent token classes, each signed with its own secret:
//! short-lived access tokens that authorize requests, and long-lived refresh
//! tokens that only mint new pairs. Verification is stateless; whether a
//! refresh token is still the current one is decided by the session manager.

use std::sync::Arc;

use gymkeep_shared::{Principal, PrincipalId, Role};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};

/// Clock skew tolerated when checking expiry
const LEEWAY_SECONDS: i64 = 60;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal ID)
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    /// Role the token was minted for
    pub role: Role,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Unique token ID, keeps tokens minted in the same second distinct
    pub jti: String,
}

impl AccessClaims {
    pub fn principal_id(&self) -> PrincipalId {
        PrincipalId(self.sub)
    }
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (principal ID)
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl RefreshClaims {
    pub fn principal_id(&self) -> PrincipalId {
        PrincipalId(self.sub)
    }
}

trait Expiring {
    fn exp(&self) -> i64;
}

impl Expiring for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

impl Expiring for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Access,
    Refresh,
}

/// Secrets and lifetimes for both token classes
#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service on the wall clock
    pub fn new(settings: &TokenSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            access: SigningKeys::new(&settings.access_secret, settings.access_ttl),
            refresh: SigningKeys::new(&settings.refresh_secret, settings.refresh_ttl),
            clock,
        }
    }

    pub fn ttl(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access.ttl,
            TokenClass::Refresh => self.refresh.ttl,
        }
    }

    /// Generate an access token for a principal
    pub fn issue_access(&self, principal: &Principal) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = AccessClaims {
            sub: principal.id.0,
            name: principal.name.clone(),
            email: principal.email.clone(),
            role: principal.role,
            iat: now.unix_timestamp(),
            exp: expires_at(now, self.access.ttl)?,
            jti: Uuid::new_v4().to_string(),
        };

        sign(&claims, &self.access)
    }

    /// Generate a refresh token for a principal
    pub fn issue_refresh(&self, principal: &Principal) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = RefreshClaims {
            sub: principal.id.0,
            role: principal.role,
            iat: now.unix_timestamp(),
            exp: expires_at(now, self.refresh.ttl)?,
            jti: Uuid::new_v4().to_string(),
        };

        sign(&claims, &self.refresh)
    }

    /// Generate both tokens
    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(principal)?,
            refresh_token: self.issue_refresh(principal)?,
        })
    }

    /// Validate an access token specifically
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, &self.access)
    }

    /// Validate a refresh token specifically
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token, &self.refresh)
    }

    fn verify<T>(&self, token: &str, keys: &SigningKeys) -> Result<T, TokenError>
    where
        T: DeserializeOwned + Expiring,
    {
        // Explicit algorithm prevents algorithm confusion attacks.
        // Expiry is checked against the injected clock instead of the library's.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<T>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })?;

        if claims.exp() + LEEWAY_SECONDS < self.clock.now().unix_timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn expires_at(now: OffsetDateTime, ttl: Duration) -> Result<i64, TokenError> {
    now.checked_add(ttl)
        .map(OffsetDateTime::unix_timestamp)
        .ok_or_else(|| TokenError::Encoding(format!("token lifetime {ttl} out of range")))
}

fn sign<T: Serialize>(claims: &T, keys: &SigningKeys) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
        .map_err(|e| TokenError::Encoding(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Malformed token")]
    Malformed,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    fn settings() -> TokenSettings {
        TokenSettings {
            access_secret: "access-secret-key-at-least-32-chars!".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_secret: "refresh-secret-key-at-least-32-chars".to_string(),
            refresh_ttl: Duration::days(10),
        }
    }

    fn principal() -> Principal {
        let now = OffsetDateTime::now_utc();
        Principal {
            id: PrincipalId::new(),
            role: Role::Member,
            name: "Jordan Squat".to_string(),
            email: "jordan@gym.test".to_string(),
            password_hash: "hash".to_string(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_generation_and_validation() {
        let tokens = TokenService::new(&settings());
        let principal = principal();

        let pair = tokens.issue_pair(&principal).expect("Failed to generate tokens");

        let access = tokens
            .verify_access(&pair.access_token)
            .expect("Invalid access token");
        assert_eq!(access.principal_id(), principal.id);
        assert_eq!(access.email, "jordan@gym.test");
        assert_eq!(access.name, "Jordan Squat");
        assert_eq!(access.role, Role::Member);

        let refresh = tokens
            .verify_refresh(&pair.refresh_token)
            .expect("Invalid refresh token");
        assert_eq!(refresh.principal_id(), principal.id);
        assert_eq!(refresh.role, Role::Member);
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn test_tokens_minted_together_are_distinct() {
        let tokens = TokenService::new(&settings());
        let principal = principal();

        let first = tokens.issue_refresh(&principal).unwrap();
        let second = tokens.issue_refresh(&principal).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_classes_do_not_cross_verify() {
        let tokens = TokenService::new(&settings());
        let pair = tokens.issue_pair(&principal()).unwrap();

        assert!(matches!(
            tokens.verify_refresh(&pair.access_token),
            Err(TokenError::BadSignature)
        ));
        assert!(matches!(
            tokens.verify_access(&pair.refresh_token),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let tokens = TokenService::new(&settings());
        let mut other = settings();
        other.access_secret = "some-other-access-secret-32-chars-long".to_string();
        let foreign = TokenService::new(&other);

        let token = foreign.issue_access(&principal()).unwrap();
        assert!(matches!(
            tokens.verify_access(&token),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = TokenService::new(&settings());
        for garbage in ["", "abc", "a.b.c", "not a token at all"] {
            assert!(matches!(
                tokens.verify_access(garbage),
                Err(TokenError::Malformed)
            ));
        }
    }

    #[test]
    fn test_any_flipped_byte_is_rejected() {
        let tokens = TokenService::new(&settings());
        let principal = principal();
        let token = tokens.issue_access(&principal).unwrap();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            let result = tokens.verify_access(&tampered);
            assert!(result.is_err(), "tampered byte {i} was accepted");
        }
    }

    #[test]
    fn test_expiry_uses_clock() {
        let clock = Arc::new(ManualClock::default());
        let tokens = TokenService::with_clock(&settings(), clock.clone());
        let pair = tokens.issue_pair(&principal()).unwrap();

        // Inside the leeway window the token is still accepted
        clock.advance(Duration::minutes(15) + Duration::seconds(30));
        assert!(tokens.verify_access(&pair.access_token).is_ok());

        clock.advance(Duration::minutes(1));
        assert!(matches!(
            tokens.verify_access(&pair.access_token),
            Err(TokenError::Expired)
        ));

        // Refresh token lives much longer
        assert!(tokens.verify_refresh(&pair.refresh_token).is_ok());
        clock.advance(Duration::days(11));
        assert!(matches!(
            tokens.verify_refresh(&pair.refresh_token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let mut huge = settings();
        huge.access_ttl = Duration::days(3_000_000);
        huge.refresh_ttl = Duration::days(3_000_000);
        let tokens = TokenService::new(&huge);
        let principal = principal();

        assert!(matches!(
            tokens.issue_access(&principal),
            Err(TokenError::Encoding(_))
        ));
        assert!(matches!(
            tokens.issue_refresh(&principal),
            Err(TokenError::Encoding(_))
        ));
        assert!(tokens.issue_pair(&principal).is_err());
    }

    #[test]
    fn test_ttl_per_class() {
        let tokens = TokenService::new(&settings());
        assert_eq!(tokens.ttl(TokenClass::Access), Duration::minutes(15));
        assert_eq!(tokens.ttl(TokenClass::Refresh), Duration::days(10));
    }
}
