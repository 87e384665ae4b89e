//! Authentication routes
//!
//! The same handlers serve every role; the realm in router state decides which
//! store, token claims and response keys are used.

use axum::{
    extract::{Extension, State},
    http::{
        header::{HeaderName, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::{
    auth::{
        read_cookie, AuthPrincipal, Session, TokenClass, ACCESS_COOKIE, REFRESH_COOKIE,
    },
    error::{ApiError, ApiResponse, ApiResult, AppJson},
    state::RoleRealm,
};

// =============================================================================
// Request Types
// =============================================================================

// Missing fields deserialize as empty so the session layer reports them
// with its own message.

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

type CookieHeaders = AppendHeaders<[(HeaderName, HeaderValue); 2]>;

// =============================================================================
// Handlers
// =============================================================================

/// Login with email and password
pub async fn login(
    State(realm): State<RoleRealm>,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<Response> {
    let session = realm.sessions.login(&req.email, &req.password).await?;

    let cookies = session_cookies(&realm, &session)?;
    let data = session_data(&realm, &session)?;
    let message = format!("{} logged in successfully", realm.role().title());

    Ok((cookies, ApiResponse::ok(data, message)).into_response())
}

/// Rotate the session. The refresh token comes from the cookie, else the body.
pub async fn refresh(
    State(realm): State<RoleRealm>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<Response> {
    let presented = read_cookie(&headers, REFRESH_COOKIE)
        .map(str::to_string)
        .or_else(|| body.and_then(|Json(req)| req.refresh_token));

    let session = realm.sessions.refresh(presented.as_deref()).await?;

    let cookies = session_cookies(&realm, &session)?;
    let data = session_data(&realm, &session)?;

    Ok((cookies, ApiResponse::ok(data, "Access token refreshed successfully")).into_response())
}

/// Logout: drop the stored refresh token and clear both cookies
pub async fn logout(
    State(realm): State<RoleRealm>,
    Extension(AuthPrincipal(principal)): Extension<AuthPrincipal>,
) -> ApiResult<Response> {
    realm.sessions.logout(principal.id).await?;

    let cookies = AppendHeaders([
        (SET_COOKIE, realm.cookies.clear(ACCESS_COOKIE).map_err(|_| ApiError::Internal)?),
        (SET_COOKIE, realm.cookies.clear(REFRESH_COOKIE).map_err(|_| ApiError::Internal)?),
    ]);
    let message = format!("{} logged out successfully", realm.role().title());

    Ok((cookies, ApiResponse::ok(json!({}), message)).into_response())
}

/// Change the caller's password
pub async fn change_password(
    State(realm): State<RoleRealm>,
    Extension(AuthPrincipal(principal)): Extension<AuthPrincipal>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<Value>> {
    realm
        .sessions
        .change_password(principal.id, &req.old_password, &req.new_password)
        .await?;

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

/// Get the authenticated principal
pub async fn me(
    State(realm): State<RoleRealm>,
    Extension(AuthPrincipal(principal)): Extension<AuthPrincipal>,
) -> ApiResult<ApiResponse<Value>> {
    let role = realm.role();

    let mut data = Map::new();
    data.insert(role.as_str().to_string(), to_json(&principal)?);

    Ok(ApiResponse::ok(
        Value::Object(data),
        format!("Current {role} fetched successfully"),
    ))
}

// =============================================================================
// Helpers
// =============================================================================

/// `{<role>: profile, accessToken, refreshToken}`
fn session_data(realm: &RoleRealm, session: &Session) -> ApiResult<Value> {
    let mut data = Map::new();
    data.insert(realm.role().as_str().to_string(), to_json(&session.principal)?);
    data.insert("accessToken".to_string(), Value::String(session.access_token.clone()));
    data.insert("refreshToken".to_string(), Value::String(session.refresh_token.clone()));
    Ok(Value::Object(data))
}

fn session_cookies(realm: &RoleRealm, session: &Session) -> ApiResult<CookieHeaders> {
    let tokens = realm.sessions.tokens();

    let access = realm
        .cookies
        .set(ACCESS_COOKIE, &session.access_token, tokens.ttl(TokenClass::Access))
        .map_err(|_| ApiError::Internal)?;
    let refresh = realm
        .cookies
        .set(REFRESH_COOKIE, &session.refresh_token, tokens.ttl(TokenClass::Refresh))
        .map_err(|_| ApiError::Internal)?;

    Ok(AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]))
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "Response serialization failed");
        ApiError::Internal
    })
}
