//! Authentication module for GymKeep

pub mod clock;
pub mod cookies;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cookies::{read_cookie, CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use error::{AuthError, AuthResult};
pub use jwt::{AccessClaims, RefreshClaims, TokenClass, TokenError, TokenPair, TokenService, TokenSettings};
pub use middleware::{extract_access_token, require_principal, AuthPrincipal, Authenticator};
pub use password::{
    validate_password_strength, CredentialHasher, PasswordError, PasswordValidationError,
};
pub use session::{Registration, Session, SessionManager};
