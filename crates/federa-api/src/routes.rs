//! API route definitions

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::middleware::{request_id_middleware, require_admin_api_key, resolve_tenant};
use crate::state::AppState;

/// Create the full broker router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        // Logout landing pages and the upstream callback
        .route("/logout/callback", get(handlers::logout::logout_callback))
        .route("/logout/complete", get(handlers::logout::logout_complete))
        .route("/error", get(handlers::logout::logout_error))
        .nest("/resources", admin_routes(state.clone()))
        .merge(tenant_routes(state.clone()))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Endpoints addressed to one tenant through the first path segment
fn tenant_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/{tenant}/.well-known/openid-configuration",
            get(handlers::discovery::openid_configuration),
        )
        .route("/{tenant}/oauth2/jwks", get(handlers::discovery::jwks))
        .route(
            "/{tenant}/userinfo",
            get(handlers::userinfo::user_info).post(handlers::userinfo::user_info),
        )
        .route(
            "/{tenant}/connect/logout",
            get(handlers::logout::end_session).post(handlers::logout::end_session_form),
        )
        .route(
            "/{tenant}/oauth2/authorization/{registration_id}",
            get(handlers::authorize::upstream_authorization),
        )
        .route_layer(middleware::from_fn_with_state(state, resolve_tenant))
}

/// In-memory user pool administration
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/user-pool", post(handlers::admin::create_user_pool))
        .route("/user-pool/{pool_name}", delete(handlers::admin::delete_user_pool))
        .route(
            "/registrations/{registration_id}",
            delete(handlers::admin::delete_registration),
        )
        .route_layer(middleware::from_fn_with_state(state, require_admin_api_key))
}
