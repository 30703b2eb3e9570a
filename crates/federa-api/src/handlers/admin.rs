//! User pool administration
//!
//! Registrations are applied to the in-memory registries. A failed create
//! leaves no trace of the pool: its tenant bucket and any upstream
//! registrations already added are removed together.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use federa_core::{BrokerError, RegistrationId, TenantId, UpstreamRegistration, UserPool, UserPoolId};

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::Validator;

/// `POST /resources/user-pool` body
#[derive(Debug, Deserialize)]
pub struct CreateUserPoolRequest {
    pub user_pool_id: String,
    pub pool_name: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// JWK set document, as a JSON string or inline object
    pub jwk_set: serde_json::Value,
    #[serde(default)]
    pub client_registrations: Vec<UpstreamRegistration>,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub registrations: Vec<String>,
}

impl AdminResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            tenant_id: None,
            registrations: Vec::new(),
        }
    }
}

/// Register a user pool and its upstream registrations
#[instrument(skip(state, request), fields(pool_name = %request.pool_name))]
pub async fn create_user_pool(
    State(state): State<AppState>,
    Json(request): Json<CreateUserPoolRequest>,
) -> Result<(StatusCode, Json<AdminResponse>), ApiError> {
    let mut validator = Validator::new();
    validator
        .required("user_pool_id", &request.user_pool_id)
        .pool_name("pool_name", &request.pool_name);
    validator.validate()?;

    check_registration_ids(&state, &request.client_registrations)?;

    let jwk_set = match request.jwk_set {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    let pool = UserPool {
        user_pool_id: UserPoolId::new(request.user_pool_id),
        pool_name: request.pool_name,
        scopes: request.scopes,
        jwk_set,
        is_active: true,
    };

    // A pool that already exists is refused before anything of it is touched
    let tenant_id = match state.tenants.register_new_user_pool(&pool) {
        Ok(tenant_id) => tenant_id,
        Err(e @ BrokerError::Conflict { .. }) => return Err(e.into()),
        Err(e) => {
            warn!("Rejected user pool: {}", e);
            return Err(ApiError::invalid_request(e.to_string()));
        }
    };

    let result = register_upstreams(&state, &tenant_id, request.client_registrations).await;
    match result {
        Ok(registrations) => {
            info!("Registered user pool with {} upstreams", registrations.len());
            Ok((
                StatusCode::CREATED,
                Json(AdminResponse {
                    success: true,
                    message: "User pool registered".to_string(),
                    tenant_id: Some(tenant_id.into_inner()),
                    registrations,
                }),
            ))
        }
        Err(e) => {
            warn!("User pool registration failed, rolling back: {}", e);
            rollback(&state, &tenant_id);
            match e {
                BrokerError::Conflict { .. } => Err(e.into()),
                other => Err(ApiError::invalid_request(other.to_string())),
            }
        }
    }
}

/// Registration ids are global; refuse ones already taken. The registry
/// repeats the check atomically for creates that race past this one.
fn check_registration_ids(
    state: &AppState,
    registrations: &[UpstreamRegistration],
) -> Result<(), ApiError> {
    let mut seen = BTreeSet::new();
    for registration in registrations {
        let id = &registration.registration_id;
        if !seen.insert(id.clone()) || state.upstreams.get(id).is_some() {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "invalid_request",
                format!("Registration '{}' is already registered", id),
            ));
        }
    }
    Ok(())
}

async fn register_upstreams(
    state: &AppState,
    tenant_id: &TenantId,
    registrations: Vec<UpstreamRegistration>,
) -> federa_core::Result<Vec<String>> {
    let mut registered = Vec::with_capacity(registrations.len());
    for mut registration in registrations {
        state.end_session_discovery.resolve(&mut registration).await;
        let id = registration.registration_id.to_string();
        state.upstreams.register(tenant_id, registration)?;
        registered.push(id);
    }
    Ok(registered)
}

fn rollback(state: &AppState, tenant_id: &TenantId) {
    let removed = state.upstreams.remove_by_tenant(tenant_id);
    state.tenants.remove(tenant_id);
    info!(tenant_id = %tenant_id, removed, "Rolled back partial user pool registration");
}

/// `DELETE /resources/user-pool/{pool_name}`
#[instrument(skip(state))]
pub async fn delete_user_pool(
    State(state): State<AppState>,
    Path(pool_name): Path<String>,
) -> Result<Json<AdminResponse>, ApiError> {
    let tenant_id = TenantId::from(pool_name.as_str());
    let registrations = state.upstreams.remove_by_tenant(&tenant_id);
    let removed = state.tenants.remove(&tenant_id);

    if !removed && registrations == 0 {
        return Err(ApiError::not_found(format!(
            "User pool '{}' is not registered",
            pool_name
        )));
    }

    info!(registrations, "Removed user pool");
    Ok(Json(AdminResponse::ok(format!(
        "User pool '{}' removed with {} registrations",
        pool_name, registrations
    ))))
}

/// `DELETE /resources/registrations/{registration_id}`
#[instrument(skip(state))]
pub async fn delete_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
) -> Result<Json<AdminResponse>, ApiError> {
    match state
        .upstreams
        .remove(&RegistrationId::from(registration_id.as_str()))
    {
        Some(removed) => {
            info!(tenant_id = %removed.tenant_id, "Removed upstream registration");
            Ok(Json(AdminResponse::ok(format!(
                "Registration '{}' removed",
                registration_id
            ))))
        }
        None => Err(ApiError::not_found(format!(
            "Registration '{}' is not registered",
            registration_id
        ))),
    }
}
