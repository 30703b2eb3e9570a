//! Domain models for the Federa broker
//!
//! Records here are either owned by the broker (tenants, upstream
//! registrations, logout states, claim mappings) or handed to it by the
//! delegated authorization-server engine (authorization records).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{BrokerError, Result};
use crate::ids::*;

/// Well-known OIDC scope that only gates ID token issuance.
pub const OPENID_SCOPE: &str = "openid";

// =============================================================================
// Tenant Models
// =============================================================================

/// Persisted user pool (tenant) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPool {
    pub user_pool_id: UserPoolId,
    pub pool_name: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// JWK set JSON, including private members
    pub jwk_set: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl UserPool {
    /// The tenant id is the pool name, which is also the issuer path segment.
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.pool_name.clone())
    }
}

/// Per-tenant metadata component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMetadata {
    pub user_pool_id: UserPoolId,
    pub pool_name: String,
    pub allowed_scopes: BTreeSet<String>,
}

impl TenantMetadata {
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.pool_name.clone())
    }
}

/// A tenant's signing key set.
///
/// The original JSON is retained for the token signer; only the public
/// members are ever served.
#[derive(Clone)]
pub struct SigningKeySet {
    source: serde_json::Value,
    public: JwkSet,
}

impl SigningKeySet {
    /// Parse a JWK set document. Missing or unparseable material is a
    /// configuration error, and so is a symmetric (`oct`) key, whose secret
    /// would otherwise be served with the public set.
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(BrokerError::configuration("signing key set is missing"));
        }

        let source: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            BrokerError::configuration(format!("signing key set is not valid JSON: {}", e))
        })?;

        let public: JwkSet = serde_json::from_value(source.clone()).map_err(|e| {
            BrokerError::configuration(format!("signing key set is not a JWK set: {}", e))
        })?;

        if public.keys.is_empty() {
            return Err(BrokerError::configuration("signing key set contains no keys"));
        }

        if let Some(key) = public
            .keys
            .iter()
            .find(|k| matches!(k.algorithm, AlgorithmParameters::OctetKey(_)))
        {
            return Err(BrokerError::configuration(format!(
                "signing key set holds symmetric key {}; only asymmetric keys are allowed",
                key.common.key_id.as_deref().unwrap_or("without kid")
            )));
        }

        Ok(Self { source, public })
    }

    pub fn public_keys(&self) -> &JwkSet {
        &self.public
    }

    pub fn source(&self) -> &serde_json::Value {
        &self.source
    }

    pub fn key_ids(&self) -> Vec<String> {
        self.public
            .keys
            .iter()
            .filter_map(|k| k.common.key_id.clone())
            .collect()
    }
}

impl fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeySet")
            .field("key_ids", &self.key_ids())
            .finish()
    }
}

// =============================================================================
// Upstream Registration Models
// =============================================================================

/// Provider name whose end-session endpoint needs `client_id`/`logout_uri`.
pub const COGNITO_PROVIDER_NAME: &str = "cognito";

/// How the upstream end-session request is shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamLogoutStyle {
    /// `id_token_hint` + `post_logout_redirect_uri`
    Standard,
    /// `client_id` + `logout_uri`
    ClientBound,
}

/// The broker's OAuth2/OIDC client configuration for one upstream IdP
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UpstreamRegistration {
    #[serde(default)]
    pub registration_id: RegistrationId,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub client_authentication_method: String,
    #[serde(default)]
    pub authorization_grant_type: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub authorization_uri: String,
    #[serde(default)]
    pub token_uri: String,
    #[serde(default)]
    pub user_info_uri: String,
    #[serde(default)]
    pub jwk_set_uri: String,
    #[serde(default)]
    pub user_name_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_style: Option<UpstreamLogoutStyle>,
}

impl UpstreamRegistration {
    /// Explicit style wins; otherwise Cognito-style providers are client-bound.
    pub fn logout_style(&self) -> UpstreamLogoutStyle {
        self.logout_style.unwrap_or_else(|| {
            if self.provider_name.eq_ignore_ascii_case(COGNITO_PROVIDER_NAME) {
                UpstreamLogoutStyle::ClientBound
            } else {
                UpstreamLogoutStyle::Standard
            }
        })
    }

    pub fn end_session_endpoint(&self) -> Option<&str> {
        self.end_session_endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
    }
}

impl fmt::Debug for UpstreamRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamRegistration")
            .field("registration_id", &self.registration_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("provider_name", &self.provider_name)
            .field("authorization_uri", &self.authorization_uri)
            .field("end_session_endpoint", &self.end_session_endpoint)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// An upstream registration together with its owning tenant
#[derive(Debug, Clone)]
pub struct RegisteredUpstream {
    pub registration: UpstreamRegistration,
    pub tenant_id: TenantId,
}

// =============================================================================
// Downstream Clients
// =============================================================================

/// A client application registered with the broker under one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    pub client_id: String,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub post_logout_redirect_uris: BTreeSet<String>,
}

impl RegisteredClient {
    pub fn new(client_id: impl Into<String>, tenant_id: TenantId) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id,
            post_logout_redirect_uris: BTreeSet::new(),
        }
    }

    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uris.insert(uri.into());
        self
    }

    /// Exact string match against the registered post-logout redirect URIs
    pub fn allows_post_logout_redirect(&self, uri: &str) -> bool {
        self.post_logout_redirect_uris.contains(uri)
    }
}

// =============================================================================
// Authorization Records (produced by the authorization-server engine)
// =============================================================================

/// Attribute-bag keys the broker writes onto authorization records
pub mod attributes {
    /// Local HTTP session id at the time the authorization code was issued
    pub const AUTH_SESSION_ID: &str = "authenticated_session_id";
    /// Upstream registration used for the federated login
    pub const REGISTRATION_ID: &str = "registration_id";
    /// Upstream ID token obtained during federation
    pub const UPSTREAM_ID_TOKEN: &str = "upstream_id_token";
    /// Upstream subject (`sub`) of the federated user
    pub const UPSTREAM_SUBJECT: &str = "upstream_sub";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AuthorizationCode,
    AccessToken,
    RefreshToken,
    IdToken,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_at: ttl.map(|ttl| issued_at + ttl),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub id: AuthorizationId,
    pub tenant_id: TenantId,
    pub registered_client_id: String,
    /// Local user id (the `sub` of broker-issued tokens)
    pub principal_name: String,
    pub authorized_scopes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tokens: HashMap<TokenKind, IssuedToken>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl AuthorizationRecord {
    pub fn new(
        tenant_id: TenantId,
        registered_client_id: impl Into<String>,
        principal_name: impl Into<String>,
        authorized_scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: AuthorizationId::generate(),
            tenant_id,
            registered_client_id: registered_client_id.into(),
            principal_name: principal_name.into(),
            authorized_scopes: authorized_scopes.into_iter().collect(),
            tokens: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_token(mut self, kind: TokenKind, token: IssuedToken) -> Self {
        self.tokens.insert(kind, token);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn token(&self, kind: TokenKind) -> Option<&IssuedToken> {
        self.tokens.get(&kind)
    }

    /// String attribute, blank values treated as absent
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.attribute_str(attributes::AUTH_SESSION_ID)
    }

    pub fn registration_id(&self) -> Option<RegistrationId> {
        self.attribute_str(attributes::REGISTRATION_ID)
            .map(RegistrationId::from)
    }

    pub fn upstream_id_token(&self) -> Option<&str> {
        self.attribute_str(attributes::UPSTREAM_ID_TOKEN)
    }

    /// The principal as seen by token customization.
    pub fn principal(&self) -> Principal {
        match self.registration_id() {
            Some(registration_id) => Principal::Federated(FederatedPrincipal {
                name: self.principal_name.clone(),
                registration_id,
                upstream_subject: self
                    .attribute_str(attributes::UPSTREAM_SUBJECT)
                    .map(String::from),
            }),
            None => Principal::Local {
                name: self.principal_name.clone(),
            },
        }
    }
}

/// Authenticated principal handed to the token customizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Logged in through an upstream IdP
    Federated(FederatedPrincipal),
    /// Authenticated locally by the engine
    Local { name: String },
}

impl Principal {
    pub fn name(&self) -> &str {
        match self {
            Self::Federated(p) => &p.name,
            Self::Local { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedPrincipal {
    pub name: String,
    pub registration_id: RegistrationId,
    pub upstream_subject: Option<String>,
}

// =============================================================================
// Logout State
// =============================================================================

/// Default lifetime of an upstream-logout round trip
pub const DEFAULT_LOGOUT_STATE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutState {
    pub state: String,
    pub client_final_redirect_uri: String,
    /// The client's own `state` parameter, replayed on the final redirect
    pub client_state: Option<String>,
    pub expiry_time: DateTime<Utc>,
}

impl LogoutState {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_time
    }
}

// =============================================================================
// Login State
// =============================================================================

/// Default lifetime of an upstream login round trip
pub const DEFAULT_LOGIN_STATE_TTL_SECS: i64 = 600;

/// An upstream login started by the broker and not yet returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub state: String,
    /// Must come back in the upstream ID token
    pub nonce: String,
    pub tenant_id: TenantId,
    pub registration_id: RegistrationId,
    /// Downstream client that asked for the login
    pub client_id: String,
    pub expiry_time: DateTime<Utc>,
}

impl PendingLogin {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_time
    }
}

// =============================================================================
// Claims Models
// =============================================================================

/// Maps an upstream claim to an output claim for one (registration, scope)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimMapping {
    pub registration_id: RegistrationId,
    /// Output claim name in the user-info response
    pub claim_name: String,
    /// Claim name as provided by the upstream IdP
    pub idp_claim_name: String,
    pub scope: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ClaimMapping {
    pub fn new(
        registration_id: impl Into<RegistrationId>,
        scope: impl Into<String>,
        idp_claim_name: impl Into<String>,
        claim_name: impl Into<String>,
    ) -> Self {
        Self {
            registration_id: registration_id.into(),
            claim_name: claim_name.into(),
            idp_claim_name: idp_claim_name.into(),
            scope: scope.into(),
            is_active: true,
            created_at: Some(Utc::now()),
            updated_at: None,
            deleted_at: None,
        }
    }

    /// Active and not soft-deleted
    pub fn is_effective(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Locally retained copy of an upstream claim, value stored as JSON text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    pub user_id: String,
    pub claim_name: String,
    pub value: String,
}

impl UserClaim {
    pub fn from_value(
        user_id: impl Into<String>,
        claim_name: impl Into<String>,
        value: &serde_json::Value,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            claim_name: claim_name.into(),
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Audit Models
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthAction {
    Login,
    Logout,
}

impl AuthAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
        }
    }
}

/// Coarse client classification captured from the HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub device_type: String,
    pub os_name: String,
    pub os_version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            ip: None,
            device_type: "Unknown".to_string(),
            os_name: "Unknown".to_string(),
            os_version: "Unknown".to_string(),
        }
    }
}

/// Login/logout activity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthActivity {
    pub auth_id: Option<AuthorizationId>,
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<String>,
    pub action: AuthAction,
    /// Terminal outcome of the flow, e.g. `upstream_redirect`
    pub outcome: String,
    pub ip: Option<String>,
    pub device_type: String,
    pub os_name: String,
    pub os_version: String,
    pub created_at: DateTime<Utc>,
}

impl AuthActivity {
    pub fn new(
        action: AuthAction,
        outcome: impl Into<String>,
        authorization: Option<&AuthorizationRecord>,
        client: &ClientInfo,
    ) -> Self {
        Self {
            auth_id: authorization.map(|a| a.id.clone()),
            tenant_id: authorization.map(|a| a.tenant_id.clone()),
            user_id: authorization.map(|a| a.principal_name.clone()),
            action,
            outcome: outcome.into(),
            ip: client.ip.clone(),
            device_type: client.device_type.clone(),
            os_name: client.os_name.clone(),
            os_version: client.os_version.clone(),
            created_at: Utc::now(),
        }
    }
}
