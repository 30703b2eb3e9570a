//! Per-tenant discovery metadata and public keys

use axum::{extract::State, Extension, Json};
use jsonwebtoken::jwk::JwkSet;

use federa_core::{SigningKeySet, TenantContext, TenantMetadata};
use federa_oidc::ProviderMetadata;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /{tenant}/.well-known/openid-configuration`
pub async fn openid_configuration(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<ProviderMetadata>, ApiError> {
    let metadata = state
        .tenants
        .get::<TenantMetadata>(&context)
        .ok_or_else(|| ApiError::not_found("Tenant metadata is not registered"))?;

    Ok(Json(ProviderMetadata::for_tenant(
        &state.settings.public_base_url,
        &metadata,
    )))
}

/// `GET /{tenant}/oauth2/jwks`, public members only
pub async fn jwks(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
) -> Result<Json<JwkSet>, ApiError> {
    let keys = state
        .tenants
        .get::<SigningKeySet>(&context)
        .ok_or_else(|| ApiError::not_found("Tenant has no signing keys"))?;

    Ok(Json(keys.public_keys().clone()))
}
