//! Upstream login redirect
//!
//! Before the user agent is sent to an upstream IdP, the registration named
//! in the path and the downstream `client_id` must belong to the same
//! tenant, and that tenant must be the one the request is addressed to.
//! The `state` and `nonce` sent upstream are kept in the [`LoginStateStore`]
//! until the login returns.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

use federa_core::{
    BrokerError, RegisteredClientRepository, RegisteredUpstream, RegistrationId, Result,
    TenantContext, TenantId,
};
use federa_registry::UpstreamRegistrationRegistry;

use crate::login_state::LoginStateStore;

/// Redirect to the upstream authorization endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamLoginRedirect {
    pub location: String,
    pub state: String,
    pub nonce: String,
}

pub struct UpstreamAuthorizer {
    upstreams: Arc<UpstreamRegistrationRegistry>,
    clients: Arc<dyn RegisteredClientRepository>,
    login_states: Arc<LoginStateStore>,
    public_base_url: String,
}

impl UpstreamAuthorizer {
    pub fn new(
        upstreams: Arc<UpstreamRegistrationRegistry>,
        clients: Arc<dyn RegisteredClientRepository>,
        login_states: Arc<LoginStateStore>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            upstreams,
            clients,
            login_states,
            public_base_url: public_base_url.into(),
        }
    }

    /// Reject registration/client pairs that resolve to different tenants.
    #[instrument(skip(self))]
    pub async fn check_same_tenant(
        &self,
        registration_id: &RegistrationId,
        client_id: Option<&str>,
    ) -> Result<TenantId> {
        let client_id = client_id
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| BrokerError::missing_field("client_id"))?;

        let from_registration = self
            .upstreams
            .find_tenant_id_by_registration_id(registration_id)
            .ok_or_else(|| {
                BrokerError::validation("registration_id", "unknown upstream registration")
            })?;

        let from_client = self
            .clients
            .find_tenant_id_by_client_id(client_id)
            .await?
            .ok_or_else(|| BrokerError::validation("client_id", "unknown client"))?;

        if from_registration != from_client {
            warn!(
                registration_tenant = %from_registration,
                client_tenant = %from_client,
                "Registration and client belong to different tenants"
            );
            return Err(BrokerError::validation(
                "registration_id",
                "registration and client belong to different tenants",
            ));
        }

        Ok(from_registration)
    }

    /// Validate and build the redirect for `GET /{tenant}/oauth2/authorization/{registration_id}`.
    #[instrument(skip(self, context), fields(tenant_id = %context.tenant_id()))]
    pub async fn begin(
        &self,
        context: &TenantContext,
        registration_id: &RegistrationId,
        client_id: Option<&str>,
    ) -> Result<UpstreamLoginRedirect> {
        let tenant_id = self.check_same_tenant(registration_id, client_id).await?;
        if &tenant_id != context.tenant_id() {
            return Err(BrokerError::validation(
                "registration_id",
                "registration does not belong to this tenant",
            ));
        }

        let registered = self
            .upstreams
            .get(registration_id)
            .ok_or_else(|| BrokerError::not_found("UpstreamRegistration", registration_id.as_str()))?;

        let client_id = client_id.unwrap_or_default();
        let pending = self
            .login_states
            .save(&tenant_id, registration_id, client_id);
        let location = match self.authorization_url(&registered, &pending.state, &pending.nonce) {
            Ok(location) => location,
            Err(e) => {
                // Nothing was sent upstream; the state would never come back
                let _ = self.login_states.consume(&pending.state);
                return Err(e);
            }
        };

        info!("Redirecting to upstream {}", registration_id);
        Ok(UpstreamLoginRedirect {
            location,
            state: pending.state,
            nonce: pending.nonce,
        })
    }

    pub fn authorization_url(
        &self,
        registered: &RegisteredUpstream,
        state: &str,
        nonce: &str,
    ) -> Result<String> {
        let registration = &registered.registration;
        let mut url = Url::parse(&registration.authorization_uri).map_err(|e| {
            BrokerError::configuration(format!("malformed authorization_uri: {}", e))
        })?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &registration.client_id)
            .append_pair("redirect_uri", &self.expand_redirect_uri(registered))
            .append_pair("scope", &registration.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("nonce", nonce);

        Ok(url.into())
    }

    /// Expand `{baseUrl}` and `{registrationId}` placeholders.
    pub fn expand_redirect_uri(&self, registered: &RegisteredUpstream) -> String {
        registered
            .registration
            .redirect_uri
            .replace("{baseUrl}", self.public_base_url.trim_end_matches('/'))
            .replace(
                "{registrationId}",
                registered.registration.registration_id.as_str(),
            )
    }
}
