//! OIDC user-info endpoint

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Extension, Json,
};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use federa_core::{TenantContext, TokenKind};

use crate::error::ApiError;
use crate::middleware::bearer_token;
use crate::state::AppState;

/// `GET|POST /{tenant}/userinfo`
#[instrument(skip_all, fields(tenant_id = %context.tenant_id()))]
pub async fn user_info(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    headers: HeaderMap,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::invalid_token("Bearer access token required"))?;

    let record = state
        .authorizations
        .find_by_token(token, TokenKind::AccessToken)
        .await?
        .ok_or_else(|| ApiError::invalid_token("Access token is not recognised"))?;

    if &record.tenant_id != context.tenant_id() {
        warn!(token_tenant = %record.tenant_id, "Access token presented to another tenant");
        return Err(ApiError::invalid_token("Access token was not issued by this tenant"));
    }

    let expired = record
        .token(TokenKind::AccessToken)
        .and_then(|t| t.expires_at)
        .is_some_and(|expires_at| expires_at <= Utc::now());
    if expired {
        return Err(ApiError::invalid_token("Access token has expired"));
    }

    let claims = state.user_info.user_info(&record).await?;
    debug!(claims = claims.len(), "Serving user info");
    Ok(Json(claims))
}
