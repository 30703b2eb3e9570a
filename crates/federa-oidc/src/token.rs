//! Token Claim Customizer
//!
//! Called by the authorization-server engine for every token it issues.
//! A missing authorization or principal is not an error; nothing is added.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument};

use federa_core::{AuthorizationRecord, FederatedPrincipal, Principal, TokenKind};
use federa_registry::UpstreamRegistrationRegistry;

pub const REGISTRATION_ID_CLAIM: &str = "registration_id";
pub const AUTH_SESSION_ID_CLAIM: &str = "auth_session_id";
pub const SESSION_ID_CLAIM: &str = "sid";
pub const UUID_CLAIM: &str = "uuid";

/// One-way session identifier: SHA-256, URL-safe base64 without padding
pub fn hash_session_id(session_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(session_id.as_bytes()))
}

pub struct TokenClaimCustomizer {
    upstreams: Arc<UpstreamRegistrationRegistry>,
}

impl TokenClaimCustomizer {
    pub fn new(upstreams: Arc<UpstreamRegistrationRegistry>) -> Self {
        Self { upstreams }
    }

    #[instrument(skip(self, authorization, claims))]
    pub fn customize(
        &self,
        kind: TokenKind,
        authorization: Option<&AuthorizationRecord>,
        claims: &mut Map<String, Value>,
    ) {
        let Some(authorization) = authorization else {
            debug!("No authorization at token issuance");
            return;
        };

        match kind {
            TokenKind::AccessToken => {
                if let Principal::Federated(principal) = authorization.principal() {
                    claims.insert(
                        REGISTRATION_ID_CLAIM.to_string(),
                        Value::String(principal.registration_id.to_string()),
                    );
                    claims.insert(
                        AUTH_SESSION_ID_CLAIM.to_string(),
                        Value::String(authorization.id.to_string()),
                    );
                    self.add_uuid(&principal, claims);
                }
            }
            TokenKind::IdToken => {
                if let Some(session_id) = authorization.session_id() {
                    claims.insert(
                        SESSION_ID_CLAIM.to_string(),
                        Value::String(hash_session_id(session_id)),
                    );
                }
                if let Principal::Federated(principal) = authorization.principal() {
                    self.add_uuid(&principal, claims);
                }
            }
            TokenKind::RefreshToken | TokenKind::AuthorizationCode => {}
        }
    }

    /// `uuid = <provider name>_<upstream subject>` for known registrations
    fn add_uuid(&self, principal: &FederatedPrincipal, claims: &mut Map<String, Value>) {
        let Some(subject) = principal.upstream_subject.as_deref() else {
            return;
        };
        if let Some(registered) = self.upstreams.get(&principal.registration_id) {
            claims.insert(
                UUID_CLAIM.to_string(),
                Value::String(format!("{}_{}", registered.registration.provider_name, subject)),
            );
        }
    }
}
