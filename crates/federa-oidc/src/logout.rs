//! Federated Logout Orchestrator
//!
//! Drives RP-initiated logout across the client, the broker and the upstream
//! IdP:
//!
//! 1. terminate the local session,
//! 2. recover the upstream registration and ID token from the authorization
//!    record bound to the client's ID token,
//! 3. redirect to the upstream end-session endpoint with a fresh logout state,
//! 4. on callback, consume the state and return to the client.
//!
//! Any failure before step 3 completes degrades to a local-only logout; no
//! step ever produces an error response. The client is only ever sent back to
//! a post-logout redirect URI registered for it under the request's tenant.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use federa_core::{
    AuditRepository, AuthAction, AuthActivity, AuthorizationRecord, AuthorizationStore,
    BrokerError, ClientInfo, RegisteredClientRepository, Result, SessionStore, TenantContext,
    TokenKind, UpstreamLogoutStyle,
};
use federa_registry::UpstreamRegistrationRegistry;

use crate::audit::record_best_effort;
use crate::state_store::LogoutStateStore;

pub const CALLBACK_PATH: &str = "/logout/callback";

// =============================================================================
// Settings & Requests
// =============================================================================

#[derive(Debug, Clone)]
pub struct LogoutSettings {
    /// Public base URL of the broker, without a tenant segment
    pub public_base_url: String,
    /// Page shown when a logout callback cannot be matched
    pub error_path: String,
    /// Default page when the client gave no post-logout redirect URI
    pub logout_complete_path: String,
}

impl LogoutSettings {
    pub fn callback_uri(&self) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            CALLBACK_PATH
        )
    }
}

/// RP-initiated logout as received at the end-session endpoint
#[derive(Debug, Clone, Default)]
pub struct LogoutRequest {
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
    /// Identifies the client when there is no ID token hint
    pub client_id: Option<String>,
    /// Local session id carried by the request cookie, if any
    pub session_id: Option<String>,
    pub client: ClientInfo,
}

impl LogoutRequest {
    fn redirect_uri(&self) -> Option<&str> {
        non_blank(self.post_logout_redirect_uri.as_deref())
    }

    fn client_id(&self) -> Option<&str> {
        non_blank(self.client_id.as_deref())
    }

    fn client_state(&self) -> Option<&str> {
        non_blank(self.state.as_deref())
    }
}

/// Terminal redirect of a logout step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Continue at the upstream end-session endpoint
    Upstream(String),
    /// Local-only logout, back to the client or the default page
    Fallback(String),
    /// Upstream round trip finished, back to the client
    Completed(String),
    /// Callback state missing, unknown or expired
    Rejected(String),
}

impl LogoutOutcome {
    pub fn location(&self) -> &str {
        match self {
            Self::Upstream(l) | Self::Fallback(l) | Self::Completed(l) | Self::Rejected(l) => l,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "upstream_redirect",
            Self::Fallback(_) => "fallback_redirect",
            Self::Completed(_) => "callback_completed",
            Self::Rejected(_) => "callback_rejected",
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct LogoutOrchestrator {
    authorizations: Arc<dyn AuthorizationStore>,
    sessions: Arc<dyn SessionStore>,
    clients: Arc<dyn RegisteredClientRepository>,
    upstreams: Arc<UpstreamRegistrationRegistry>,
    states: Arc<LogoutStateStore>,
    audit: Arc<dyn AuditRepository>,
    settings: LogoutSettings,
}

impl LogoutOrchestrator {
    pub fn new(
        authorizations: Arc<dyn AuthorizationStore>,
        sessions: Arc<dyn SessionStore>,
        clients: Arc<dyn RegisteredClientRepository>,
        upstreams: Arc<UpstreamRegistrationRegistry>,
        states: Arc<LogoutStateStore>,
        audit: Arc<dyn AuditRepository>,
        settings: LogoutSettings,
    ) -> Self {
        Self {
            authorizations,
            sessions,
            clients,
            upstreams,
            states,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &LogoutSettings {
        &self.settings
    }

    /// Handle an end-session request addressed to the tenant in `context`.
    #[instrument(
        skip(self, context, request),
        fields(tenant_id = %context.tenant_id(), has_hint = request.id_token_hint.is_some())
    )]
    pub async fn begin(&self, context: &TenantContext, request: LogoutRequest) -> LogoutOutcome {
        let record = match self.find_authorization(&request).await {
            Some(record) if &record.tenant_id != context.tenant_id() => {
                warn!(
                    owner = %record.tenant_id,
                    "ID token hint belongs to another tenant"
                );
                let redirect = self.allowed_redirect(context, None, &request).await;
                let outcome = self.fallback(redirect.as_deref(), &request);
                return self.finish(outcome, None, &request.client).await;
            }
            other => other,
        };

        let redirect = self
            .allowed_redirect(context, record.as_ref(), &request)
            .await;

        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| record.as_ref().and_then(|r| r.session_id().map(String::from)));

        let Some(session_id) = session_id else {
            warn!("No session to log out");
            let outcome = self.fallback(redirect.as_deref(), &request);
            return self.finish(outcome, record.as_ref(), &request.client).await;
        };

        if let Some(bound) = record.as_ref().and_then(|r| r.session_id()) {
            if bound != session_id {
                warn!("ID token hint is bound to a different session");
                let outcome = self.fallback(redirect.as_deref(), &request);
                return self.finish(outcome, record.as_ref(), &request.client).await;
            }
        }

        match self.sessions.invalidate(&session_id).await {
            Ok(existed) => debug!(existed, "Local session invalidated"),
            Err(e) => warn!("Failed to invalidate local session: {}", e),
        }

        let Some(record) = record else {
            let outcome = self.fallback(redirect.as_deref(), &request);
            return self.finish(outcome, None, &request.client).await;
        };

        let outcome = match self.upstream_logout_uri(&record, redirect.as_deref(), &request) {
            Ok(uri) => {
                info!("Redirecting to upstream end-session endpoint");
                LogoutOutcome::Upstream(uri)
            }
            Err(e) => {
                warn!("Upstream logout unavailable, logging out locally: {}", e);
                self.fallback(redirect.as_deref(), &request)
            }
        };

        if let Err(e) = self.authorizations.remove(&record.id).await {
            warn!("Failed to remove authorization {}: {}", record.id, e);
        }

        self.finish(outcome, Some(&record), &request.client).await
    }

    /// Handle the upstream IdP's return to `/logout/callback`.
    #[instrument(skip(self, state, client))]
    pub async fn complete(&self, state: Option<&str>, client: &ClientInfo) -> LogoutOutcome {
        let outcome = match self.states.consume(state.unwrap_or_default()) {
            Ok(entry) => {
                let location = match entry.client_state.as_deref() {
                    Some(client_state) => {
                        append_query(&entry.client_final_redirect_uri, "state", client_state)
                    }
                    None => entry.client_final_redirect_uri,
                };
                LogoutOutcome::Completed(location)
            }
            Err(e) => {
                warn!("Logout callback rejected: {}", e);
                LogoutOutcome::Rejected(self.settings.error_path.clone())
            }
        };

        self.finish(outcome, None, client).await
    }

    async fn find_authorization(&self, request: &LogoutRequest) -> Option<AuthorizationRecord> {
        let hint = non_blank(request.id_token_hint.as_deref())?;
        match self.authorizations.find_by_token(hint, TokenKind::IdToken).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Authorization lookup failed: {}", e);
                None
            }
        }
    }

    /// The requested post-logout redirect URI, if it is registered for the
    /// client behind the request under this tenant. The client comes from the
    /// authorization record when there is one, otherwise from `client_id`.
    async fn allowed_redirect(
        &self,
        context: &TenantContext,
        record: Option<&AuthorizationRecord>,
        request: &LogoutRequest,
    ) -> Option<String> {
        let uri = request.redirect_uri()?;

        let client_id = match (record, request.client_id()) {
            (Some(record), Some(client_id)) if record.registered_client_id != client_id => {
                warn!("client_id does not match the ID token hint");
                return None;
            }
            (Some(record), _) => record.registered_client_id.as_str(),
            (None, Some(client_id)) => client_id,
            (None, None) => {
                warn!("post_logout_redirect_uri without a client to check it against");
                return None;
            }
        };

        let client = match self.clients.find_by_client_id(client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                warn!(client_id, "Unknown client");
                return None;
            }
            Err(e) => {
                warn!("Client lookup failed: {}", e);
                return None;
            }
        };

        if &client.tenant_id != context.tenant_id() {
            warn!(client_id, "Client belongs to another tenant");
            return None;
        }
        if !client.allows_post_logout_redirect(uri) {
            warn!(client_id, "post_logout_redirect_uri is not registered for the client");
            return None;
        }

        Some(uri.to_string())
    }

    fn upstream_logout_uri(
        &self,
        record: &AuthorizationRecord,
        redirect: Option<&str>,
        request: &LogoutRequest,
    ) -> Result<String> {
        let registration_id = record
            .registration_id()
            .ok_or_else(|| BrokerError::resolution("authorization has no registration id"))?;
        let upstream_id_token = record
            .upstream_id_token()
            .ok_or_else(|| BrokerError::resolution("authorization has no upstream ID token"))?;

        let registered = self
            .upstreams
            .get(&registration_id)
            .ok_or_else(|| BrokerError::not_found("UpstreamRegistration", registration_id.as_str()))?;
        let registration = &registered.registration;

        let endpoint = registration.end_session_endpoint().ok_or_else(|| {
            BrokerError::resolution(format!(
                "registration {} has no end-session endpoint",
                registration_id
            ))
        })?;
        let mut url = Url::parse(endpoint).map_err(|e| {
            BrokerError::resolution(format!("malformed end-session endpoint: {}", e))
        })?;

        let (final_uri, client_state) = match redirect {
            Some(uri) => (uri, request.client_state().map(String::from)),
            None => (self.settings.logout_complete_path.as_str(), None),
        };
        let state = self.states.save(final_uri, client_state);
        let callback = append_query(&self.settings.callback_uri(), "state", &state);

        {
            let mut query = url.query_pairs_mut();
            match registration.logout_style() {
                UpstreamLogoutStyle::Standard => {
                    query
                        .append_pair("id_token_hint", upstream_id_token)
                        .append_pair("post_logout_redirect_uri", &callback);
                }
                UpstreamLogoutStyle::ClientBound => {
                    query
                        .append_pair("client_id", &registration.client_id)
                        .append_pair("logout_uri", &callback);
                }
            }
        }

        Ok(url.into())
    }

    fn fallback(&self, redirect: Option<&str>, request: &LogoutRequest) -> LogoutOutcome {
        let location = match (redirect, request.client_state()) {
            (Some(uri), Some(state)) => append_query(uri, "state", state),
            (Some(uri), None) => uri.to_string(),
            (None, _) => self.settings.logout_complete_path.clone(),
        };
        LogoutOutcome::Fallback(location)
    }

    async fn finish(
        &self,
        outcome: LogoutOutcome,
        record: Option<&AuthorizationRecord>,
        client: &ClientInfo,
    ) -> LogoutOutcome {
        let activity = AuthActivity::new(AuthAction::Logout, outcome.as_str(), record, client);
        record_best_effort(self.audit.as_ref(), activity).await;
        outcome
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Append one query parameter, keeping whatever query the URI already has.
pub fn append_query(uri: &str, key: &str, value: &str) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.into()
        }
        Err(_) => {
            let encoded: String = url::form_urlencoded::Serializer::new(String::new())
                .append_pair(key, value)
                .finish();
            let separator = if uri.contains('?') { '&' } else { '?' };
            format!("{}{}{}", uri, separator, encoded)
        }
    }
}
