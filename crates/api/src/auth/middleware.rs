//! Authentication middleware
//!
//! Resolves the caller from the `accessToken` cookie or an
//! `Authorization: Bearer` header and attaches the principal's profile to the
//! request. Only the access token is checked; the stored refresh token plays
//! no part, so an access token keeps working after logout until it expires.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use gymkeep_shared::{PrincipalProfile, PrincipalStore};
use tracing::debug;

use super::cookies::{read_cookie, ACCESS_COOKIE};
use super::error::{AuthError, AuthResult};
use super::jwt::TokenService;
use super::session::SessionManager;
use crate::error::ApiError;

/// The authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub PrincipalProfile);

/// Access-token gate for one role
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn PrincipalStore>,
    tokens: Arc<TokenService>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn PrincipalStore>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// Gate sharing a session manager's store and token service
    pub fn for_sessions(sessions: &SessionManager) -> Self {
        Self::new(sessions.store().clone(), sessions.tokens().clone())
    }

    pub async fn authorize(&self, headers: &HeaderMap) -> AuthResult<PrincipalProfile> {
        let token = extract_access_token(headers)
            .ok_or_else(|| AuthError::unauthorized("Unauthorized request"))?;

        let role = self.store.role();

        let claims = self.tokens.verify_access(token).map_err(|e| {
            debug!(%role, error = %e, "Access token rejected");
            AuthError::unauthorized("Invalid access token")
        })?;

        if claims.role != role {
            debug!(%role, token_role = %claims.role, "Access token minted for another role");
            return Err(AuthError::unauthorized("Invalid access token"));
        }

        let principal = self
            .store
            .find_by_id(claims.principal_id())
            .await?
            .ok_or_else(|| AuthError::unauthorized("Invalid access token"))?;

        Ok(principal.profile())
    }
}

/// Cookie first, then bearer header
pub fn extract_access_token(headers: &HeaderMap) -> Option<&str> {
    read_cookie(headers, ACCESS_COOKIE).or_else(|| extract_bearer(headers))
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reject unauthenticated requests, otherwise attach [`AuthPrincipal`]
pub async fn require_principal(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = auth.authorize(request.headers()).await?;
    request.extensions_mut().insert(AuthPrincipal(principal));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenSettings;
    use axum::{body::Body, http::Request as HttpRequest, http::StatusCode, routing::get, Extension, Router};
    use gymkeep_shared::{MemoryPrincipalStore, NewPrincipal, Principal, PrincipalId, Role};
    use time::{Duration, OffsetDateTime};
    use tower::ServiceExt;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(&TokenSettings {
            access_secret: "access-secret-key-at-least-32-chars!".to_string(),
            access_ttl: Duration::hours(1),
            refresh_secret: "refresh-secret-key-at-least-32-chars".to_string(),
            refresh_ttl: Duration::days(10),
        }))
    }

    async fn setup(role: Role) -> (Router, Arc<TokenService>, Principal) {
        let store = Arc::new(MemoryPrincipalStore::new(role));
        let principal = store
            .insert(NewPrincipal {
                name: "Casey Lift".to_string(),
                email: "casey@gym.test".to_string(),
                password_hash: "unused".to_string(),
            })
            .await
            .unwrap();

        let tokens = tokens();
        let auth = Authenticator::new(store, tokens.clone());

        let app = Router::new()
            .route(
                "/me",
                get(|Extension(AuthPrincipal(p)): Extension<AuthPrincipal>| async move { p.email }),
            )
            .layer(axum::middleware::from_fn_with_state(auth, require_principal));

        (app, tokens, principal)
    }

    async fn call(app: Router, header: Option<(header::HeaderName, String)>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri("/me");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_cookie_token_accepted() {
        let (app, tokens, principal) = setup(Role::Member).await;
        let token = tokens.issue_access(&principal).unwrap();

        let status = call(app, Some((header::COOKIE, format!("accessToken={token}")))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bearer_token_accepted() {
        let (app, tokens, principal) = setup(Role::Member).await;
        let token = tokens.issue_access(&principal).unwrap();

        let status = call(app, Some((header::AUTHORIZATION, format!("Bearer {token}")))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let (app, _, _) = setup(Role::Member).await;
        assert_eq!(call(app, None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_token_not_accepted_as_access() {
        let (app, tokens, principal) = setup(Role::Member).await;
        let token = tokens.issue_refresh(&principal).unwrap();

        let status = call(app, Some((header::AUTHORIZATION, format!("Bearer {token}")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_other_role_rejected() {
        let (app, tokens, principal) = setup(Role::Member).await;
        let trainer = Principal {
            role: Role::Trainer,
            ..principal
        };
        let token = tokens.issue_access(&trainer).unwrap();

        let status = call(app, Some((header::AUTHORIZATION, format!("Bearer {token}")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_principal_rejected() {
        let (app, tokens, _) = setup(Role::Admin).await;
        let now = OffsetDateTime::now_utc();
        let ghost = Principal {
            id: PrincipalId::new(),
            role: Role::Admin,
            name: "Ghost".to_string(),
            email: "ghost@gym.test".to_string(),
            password_hash: "unused".to_string(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        let token = tokens.issue_access(&ghost).unwrap();

        let status = call(app, Some((header::AUTHORIZATION, format!("Bearer {token}")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_cookie_preferred_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "accessToken=from-cookie".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_access_token(&headers), Some("from-cookie"));

        headers.remove(header::COOKIE);
        assert_eq!(extract_access_token(&headers), Some("from-header"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_access_token(&headers), None);
    }
}
