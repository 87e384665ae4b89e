//! Password policy and hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Characters that satisfy the special-character rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*";

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Validate a password against the policy.
///
/// Rules are checked in a fixed order and the first violation wins.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordValidationError::TooShort);
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordValidationError::MissingUppercase);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordValidationError::MissingDigit);
    }

    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordValidationError::MissingSpecialChar);
    }

    Ok(())
}

/// Salted Argon2id hasher with a fixed work factor
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl Default for CredentialHasher {
    /// OWASP recommended parameters: m=19456 (19 MiB), t=2, p=1
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialHasher {
    /// Create a hasher with an explicit work factor
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password using Argon2id
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// [`Self::hash`] on the blocking thread pool
    pub async fn hash_async(&self, password: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
    }

    /// [`Self::verify`] on the blocking thread pool
    pub async fn verify_async(&self, password: String, hash: String) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PasswordValidationError {
    #[error("Password must be at least 6 characters long")]
    TooShort,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
    #[error("Password must contain at least one special character")]
    MissingSpecialChar,
}
