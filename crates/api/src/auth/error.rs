//! Closed error taxonomy for credential and session operations

use gymkeep_shared::StoreError;

use super::jwt::TokenError;
use super::password::{PasswordError, PasswordValidationError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing input, password policy violations
    #[error("{0}")]
    Validation(String),
    /// No such principal
    #[error("{0}")]
    NotFound(String),
    /// Bad credentials or a missing, invalid, expired or stale token
    #[error("{0}")]
    Unauthorized(String),
    /// Duplicate email on creation
    #[error("{0}")]
    Conflict(String),
    /// Hashing, store or token-signing failure. The cause is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl From<PasswordValidationError> for AuthError {
    fn from(err: PasswordValidationError) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::Conflict("Email already exists".to_string()),
            StoreError::NotFound => AuthError::NotFound("Principal not found".to_string()),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

/// Only signing failures reach this conversion. Verification failures are
/// normalized to `Unauthorized` at the call site with a context message.
impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(msg) => AuthError::Internal(msg),
            _ => AuthError::Unauthorized("Invalid token".to_string()),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
