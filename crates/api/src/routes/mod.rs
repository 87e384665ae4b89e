//! API routes

pub mod auth;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::require_principal,
    error::{handle_panic, method_not_allowed_envelope, route_not_found},
    security::security_headers_middleware,
    state::{AppState, RoleRealm},
};

/// Request bodies are small JSON credential payloads
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Routes for one role, mounted under `/api/v1/{role}`
pub fn role_router(realm: RoleRealm) -> Router {
    // Protected routes (access token required)
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/change-password", post(auth::change_password))
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            realm.authenticator.clone(),
            require_principal,
        ));

    Router::new()
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh))
        .merge(protected)
        .with_state(realm)
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state.clone());

    let api_v1_routes = state
        .realms()
        .iter()
        .fold(Router::new(), |router, realm| {
            router.nest(&format!("/{}", realm.role()), role_router(realm.clone()))
        });

    let router = Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .fallback(route_not_found)
        .layer(middleware::map_response(method_not_allowed_envelope))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    match state.cors_origin().and_then(cors_layer) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Credentialed CORS for a single browser origin
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid CORS origin");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}
