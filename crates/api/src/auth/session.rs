//! Session management: login, refresh rotation, logout and password change.
//!
//! A principal is Authenticated while the refresh token it holds equals the
//! one stored on its record. Login overwrites the stored token, refresh swaps
//! it for a new one, logout clears it. Exactly one refresh token is ever valid
//! per principal.

use std::sync::Arc;

use gymkeep_shared::{
    normalize_email, NewPrincipal, Principal, PrincipalId, PrincipalProfile, PrincipalStore, Role,
    EMAIL_MAX_LEN, EMAIL_MIN_LEN, NAME_MAX_LEN, NAME_MIN_LEN,
};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use super::error::{AuthError, AuthResult};
use super::jwt::{TokenPair, TokenService};
use super::password::{validate_password_strength, CredentialHasher};

const MISSING_FIELDS: &str = "Please fill all required fields!";

/// Result of a successful login or refresh
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: PrincipalProfile,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    fn new(principal: &Principal, pair: TokenPair) -> Self {
        Self {
            principal: principal.profile(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Input for creating a principal
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Credential and session orchestration for one role
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn PrincipalStore>,
    tokens: Arc<TokenService>,
    hasher: CredentialHasher,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        tokens: Arc<TokenService>,
        hasher: CredentialHasher,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
        }
    }

    pub fn role(&self) -> Role {
        self.store.role()
    }

    pub fn store(&self) -> &Arc<dyn PrincipalStore> {
        &self.store
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Verify credentials and open a new session, replacing any previous one
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::validation(MISSING_FIELDS));
        }

        let role = self.role();
        let email = normalize_email(email);

        let principal = self.store.find_by_email(&email).await?.ok_or_else(|| {
            warn!(%role, "login: Principal not found");
            AuthError::NotFound(format!("We could not find a {role} with that email"))
        })?;

        let valid = self
            .hasher
            .verify_async(password.to_string(), principal.password_hash.clone())
            .await?;

        if !valid {
            warn!(%role, principal_id = %principal.id, "login: Incorrect password");
            return Err(AuthError::unauthorized("Incorrect password"));
        }

        let pair = self.tokens.issue_pair(&principal)?;
        self.store
            .set_refresh_token(principal.id, &pair.refresh_token)
            .await?;

        info!(%role, principal_id = %principal.id, "login: Session opened");
        Ok(Session::new(&principal, pair))
    }

    /// Rotate a session: the presented refresh token must be the stored one.
    /// On success it is replaced and can never be used again.
    pub async fn refresh(&self, presented: Option<&str>) -> AuthResult<Session> {
        let presented = presented
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::unauthorized("Unauthorized request"))?;

        let role = self.role();

        let claims = self.tokens.verify_refresh(presented).map_err(|e| {
            debug!(%role, error = %e, "refresh: Token verification failed");
            AuthError::unauthorized("Invalid refresh token")
        })?;

        if claims.role != role {
            debug!(%role, token_role = %claims.role, "refresh: Token minted for another role");
            return Err(AuthError::unauthorized("Invalid refresh token"));
        }

        let principal = self
            .store
            .find_by_id(claims.principal_id())
            .await?
            .ok_or_else(|| AuthError::unauthorized("Invalid refresh token"))?;

        if !tokens_match(presented, principal.refresh_token.as_deref()) {
            warn!(%role, principal_id = %principal.id, "refresh: Stale refresh token presented");
            return Err(AuthError::unauthorized("Refresh token expired"));
        }

        let pair = self.tokens.issue_pair(&principal)?;
        let swapped = self
            .store
            .swap_refresh_token(principal.id, presented, &pair.refresh_token)
            .await?;

        if !swapped {
            warn!(%role, principal_id = %principal.id, "refresh: Lost rotation race");
            return Err(AuthError::unauthorized("Refresh token expired"));
        }

        debug!(%role, principal_id = %principal.id, "refresh: Session rotated");
        Ok(Session::new(&principal, pair))
    }

    /// Close the principal's session. Idempotent.
    pub async fn logout(&self, id: PrincipalId) -> AuthResult<()> {
        self.store.clear_refresh_token(id).await?;
        info!(role = %self.role(), principal_id = %id, "logout: Session closed");
        Ok(())
    }

    /// Replace the password after verifying the current one.
    ///
    /// The stored refresh token is left untouched: sessions opened before the
    /// change keep refreshing until their token expires.
    pub async fn change_password(
        &self,
        id: PrincipalId,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::validation(MISSING_FIELDS));
        }

        let role = self.role();
        let mut principal = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("{} not found", role.title())))?;

        let valid = self
            .hasher
            .verify_async(old_password.to_string(), principal.password_hash.clone())
            .await?;

        if !valid {
            warn!(%role, principal_id = %id, "change_password: Incorrect password");
            return Err(AuthError::unauthorized("Incorrect password"));
        }

        validate_password_strength(new_password)?;

        principal.password_hash = self.hasher.hash_async(new_password.to_string()).await?;
        self.store.save(&principal).await?;

        info!(%role, principal_id = %id, "change_password: Password updated");
        Ok(())
    }

    /// Create a principal in this role
    pub async fn register(&self, registration: Registration) -> AuthResult<PrincipalProfile> {
        let name = registration.name.trim();
        let name_len = name.chars().count();
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
            return Err(AuthError::validation(format!(
                "Name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters long"
            )));
        }

        let email = normalize_email(&registration.email);
        let email_len = email.chars().count();
        if !(EMAIL_MIN_LEN..=EMAIL_MAX_LEN).contains(&email_len) {
            return Err(AuthError::validation(format!(
                "Email must be between {EMAIL_MIN_LEN} and {EMAIL_MAX_LEN} characters long"
            )));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::validation("Invalid email address"));
        }

        validate_password_strength(&registration.password)?;

        let password_hash = self.hasher.hash_async(registration.password).await?;
        let principal = self
            .store
            .insert(NewPrincipal {
                name: name.to_string(),
                email,
                password_hash,
            })
            .await?;

        info!(role = %self.role(), principal_id = %principal.id, "register: Principal created");
        Ok(principal.profile())
    }
}

/// Exact, constant-time comparison against the stored token
fn tokens_match(presented: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(stored) => presented.as_bytes().ct_eq(stored.as_bytes()).into(),
        None => false,
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain, no whitespace
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
