//! Federated login capture
//!
//! After an upstream login the engine asks for the local principal, then
//! binds the resulting authorization to the local session and the upstream
//! ID token so logout can find both later. A login is only accepted when its
//! `state` names a pending login for the same registration and the ID token
//! carries that login's `nonce`.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use federa_core::{
    attributes, AuditRepository, AuthAction, AuthActivity, AuthorizationRecord,
    AuthorizationStore, BrokerError, ClaimMappingRepository, ClientInfo, FederatedPrincipal,
    RegistrationId, Result, TenantMetadata, TokenKind, UserClaim, UserClaimRepository,
};
use federa_registry::{TenantRegistry, UpstreamRegistrationRegistry};

use crate::audit::record_best_effort;
use crate::login_state::LoginStateStore;

/// Result of a completed upstream login
#[derive(Debug, Clone)]
pub struct UpstreamLogin {
    pub registration_id: RegistrationId,
    /// `state` returned by the upstream IdP on the redirect back
    pub state: String,
    /// Claims of the upstream ID token merged with its user-info response
    pub claims: Map<String, Value>,
    pub id_token: Option<String>,
}

impl UpstreamLogin {
    pub fn subject(&self) -> Option<&str> {
        self.claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn nonce(&self) -> Option<&str> {
        self.claims.get("nonce").and_then(Value::as_str)
    }
}

/// `<pool name>:<provider name>:<upstream subject>`
pub fn principal_name(pool_name: &str, provider_name: &str, upstream_subject: &str) -> String {
    format!("{}:{}:{}", pool_name, provider_name, upstream_subject)
}

pub struct FederatedLoginService {
    tenants: Arc<TenantRegistry>,
    upstreams: Arc<UpstreamRegistrationRegistry>,
    login_states: Arc<LoginStateStore>,
    authorizations: Arc<dyn AuthorizationStore>,
    mappings: Arc<dyn ClaimMappingRepository>,
    user_claims: Arc<dyn UserClaimRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl FederatedLoginService {
    pub fn new(
        tenants: Arc<TenantRegistry>,
        upstreams: Arc<UpstreamRegistrationRegistry>,
        login_states: Arc<LoginStateStore>,
        authorizations: Arc<dyn AuthorizationStore>,
        mappings: Arc<dyn ClaimMappingRepository>,
        user_claims: Arc<dyn UserClaimRepository>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            tenants,
            upstreams,
            login_states,
            authorizations,
            mappings,
            user_claims,
            audit,
        }
    }

    /// Build the local principal and refresh the captured upstream claims.
    ///
    /// The login's pending state is consumed first; a login that does not
    /// match one is rejected before anything is stored.
    #[instrument(skip(self, login), fields(registration_id = %login.registration_id))]
    pub async fn resolve_principal(&self, login: &UpstreamLogin) -> Result<FederatedPrincipal> {
        let pending = self.login_states.consume(&login.state)?;
        if pending.registration_id != login.registration_id {
            warn!(expected = %pending.registration_id, "Login returned through another registration");
            return Err(BrokerError::validation(
                "state",
                "state was issued for another registration",
            ));
        }
        if login.nonce() != Some(pending.nonce.as_str()) {
            warn!("Upstream ID token nonce does not match the login request");
            return Err(BrokerError::validation(
                "nonce",
                "does not match the login request",
            ));
        }

        let registered = self.upstreams.get(&login.registration_id).ok_or_else(|| {
            BrokerError::not_found("UpstreamRegistration", login.registration_id.as_str())
        })?;
        if registered.tenant_id != pending.tenant_id {
            return Err(BrokerError::validation(
                "registration_id",
                "registration moved to another tenant during login",
            ));
        }

        let metadata = self
            .tenants
            .get_for_tenant::<TenantMetadata>(&registered.tenant_id)
            .ok_or_else(|| BrokerError::not_found("Tenant", registered.tenant_id.as_str()))?;

        let subject = login
            .subject()
            .ok_or_else(|| BrokerError::validation("sub", "upstream subject is missing"))?;

        let name = principal_name(
            &metadata.pool_name,
            &registered.registration.provider_name,
            subject,
        );

        match self
            .capture_claims(&name, &login.registration_id, &login.claims)
            .await
        {
            Ok(count) => debug!("Captured {} upstream claims", count),
            Err(e) => warn!("Failed to capture upstream claims: {}", e),
        }

        Ok(FederatedPrincipal {
            name,
            registration_id: login.registration_id.clone(),
            upstream_subject: Some(subject.to_string()),
        })
    }

    /// Store the upstream claims referenced by any mapping of the registration.
    async fn capture_claims(
        &self,
        principal_name: &str,
        registration_id: &RegistrationId,
        claims: &Map<String, Value>,
    ) -> Result<usize> {
        let wanted: BTreeSet<String> = self
            .mappings
            .find_by_registration_id(registration_id)
            .await?
            .into_iter()
            .map(|m| m.idp_claim_name)
            .collect();

        let captured: Vec<UserClaim> = wanted
            .iter()
            .filter_map(|name| {
                claims
                    .get(name)
                    .map(|value| UserClaim::from_value(principal_name, name.as_str(), value))
            })
            .collect();

        if !captured.is_empty() {
            self.user_claims.save_all(&captured).await?;
        }
        Ok(captured.len())
    }

    /// Attach session, registration and upstream token to the authorization
    /// issued for `code`, then record the login.
    #[instrument(skip(self, code, principal, login, session_id, client))]
    pub async fn bind_authorization(
        &self,
        code: &str,
        principal: &FederatedPrincipal,
        login: &UpstreamLogin,
        session_id: Option<&str>,
        client: &ClientInfo,
    ) -> Result<AuthorizationRecord> {
        let mut record = self
            .authorizations
            .find_by_token(code, TokenKind::AuthorizationCode)
            .await?
            .ok_or_else(|| BrokerError::not_found("Authorization", "code"))?;

        record = record.with_attribute(
            attributes::REGISTRATION_ID,
            principal.registration_id.as_str(),
        );
        if let Some(subject) = principal.upstream_subject.as_deref() {
            record = record.with_attribute(attributes::UPSTREAM_SUBJECT, subject);
        }
        if let Some(session_id) = session_id.filter(|s| !s.trim().is_empty()) {
            record = record.with_attribute(attributes::AUTH_SESSION_ID, session_id);
        }
        if let Some(id_token) = login.id_token.as_deref() {
            record = record.with_attribute(attributes::UPSTREAM_ID_TOKEN, id_token);
        }

        self.authorizations.save(&record).await?;
        info!(authorization_id = %record.id, "Federated login bound to authorization");

        let activity = AuthActivity::new(AuthAction::Login, "authorized", Some(&record), client);
        record_best_effort(self.audit.as_ref(), activity).await;

        Ok(record)
    }
}
