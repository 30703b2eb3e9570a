//! Upstream login redirect

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Extension,
};
use serde::Deserialize;

use federa_core::{RegistrationId, TenantContext};

use super::found;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpstreamAuthorizationQuery {
    pub client_id: Option<String>,
}

/// `GET /{tenant}/oauth2/authorization/{registration_id}?client_id=..`
pub async fn upstream_authorization(
    State(state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path((_tenant, registration_id)): Path<(String, String)>,
    Query(query): Query<UpstreamAuthorizationQuery>,
) -> Result<Response, ApiError> {
    let redirect = state
        .authorizer
        .begin(
            &context,
            &RegistrationId::from(registration_id),
            query.client_id.as_deref(),
        )
        .await?;

    Ok(found(&redirect.location, &state.settings.error_path))
}
