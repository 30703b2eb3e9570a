//! API middleware: request ids, tenant resolution and admin authentication

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use uuid::Uuid;

use federa_core::TenantContext;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request ID Middleware
// =============================================================================

/// Request ID wrapper for extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Add unique request ID to every request
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::now_v7().to_string();

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

// =============================================================================
// Tenant Resolution Middleware
// =============================================================================

/// Attach the [`TenantContext`] of the addressed tenant to the request.
///
/// The context lives in the request's extensions and is dropped with it.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = TenantContext::for_request(&state.settings.public_base_url, request.uri().path())
        .map_err(|e| ApiError::invalid_request(e.to_string()))?;

    if !state.tenants.contains(context.tenant_id()) {
        warn!(tenant_id = %context.tenant_id(), "Request for unknown tenant");
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "invalid_request",
            format!("Tenant '{}' is not registered", context.tenant_id()),
        ));
    }

    debug!(issuer = %context.issuer(), "Resolved tenant");
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

// =============================================================================
// Admin API Key Middleware
// =============================================================================

/// Require `Authorization: Bearer <admin key>` when an admin key is configured.
pub async fn require_admin_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state
        .settings
        .admin_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
    else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            debug!("Admin API key validated successfully");
            next.run(request).await
        }
        Some(_) => {
            warn!("Invalid admin API key provided");
            ApiError::new(StatusCode::UNAUTHORIZED, "invalid_client", "Invalid admin API key")
                .into_response()
        }
        None => {
            warn!("Missing bearer token for admin endpoint");
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "Bearer token required for admin operations",
            )
            .into_response()
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Value of a `Bearer` authorization header
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
