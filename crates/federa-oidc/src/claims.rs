//! Claims Mapping Engine
//!
//! Shapes the user-info response from the claim mappings of the upstream
//! registration used at login and the claims captured from that upstream.
//! Incomplete mapping configuration yields the subject alone.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use federa_core::{
    AuthorizationRecord, ClaimMapping, ClaimMappingRepository, RegistrationId, Result, UserClaim,
    UserClaimRepository, OPENID_SCOPE,
};

pub const SUBJECT_CLAIM: &str = "sub";

fn subject_only(subject: &str) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert(SUBJECT_CLAIM.to_string(), Value::String(subject.to_string()));
    claims
}

/// Granted scopes that can contribute claims
pub fn claim_scopes(granted_scopes: &BTreeSet<String>) -> BTreeSet<String> {
    granted_scopes
        .iter()
        .filter(|s| !s.eq_ignore_ascii_case(OPENID_SCOPE) && !s.trim().is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Build the user-info claim set.
///
/// `mappings` and `user_claims` are filtered again here, so callers may pass
/// broader sets than strictly needed.
pub fn build_claims(
    subject: &str,
    granted_scopes: &BTreeSet<String>,
    registration_id: Option<&RegistrationId>,
    mappings: &[ClaimMapping],
    user_claims: &[UserClaim],
) -> Map<String, Value> {
    let mut claims = subject_only(subject);

    let Some(registration_id) = registration_id else {
        return claims;
    };

    let scopes = claim_scopes(granted_scopes);
    if scopes.is_empty() {
        return claims;
    }

    let matched: Vec<&ClaimMapping> = mappings
        .iter()
        .filter(|m| {
            m.is_effective()
                && &m.registration_id == registration_id
                && scopes.contains(&m.scope.to_lowercase())
        })
        .collect();

    for mapping in matched {
        if mapping.claim_name == SUBJECT_CLAIM || claims.contains_key(&mapping.claim_name) {
            continue;
        }

        let Some(captured) = user_claims
            .iter()
            .find(|c| c.user_id == subject && c.claim_name == mapping.idp_claim_name)
        else {
            continue;
        };

        match serde_json::from_str::<Value>(&captured.value) {
            Ok(value) => {
                claims.insert(mapping.claim_name.clone(), value);
            }
            Err(e) => {
                debug!(claim = %mapping.idp_claim_name, "Skipping undecodable claim value: {}", e);
            }
        }
    }

    claims
}

/// User-info claims backed by the claim repositories
pub struct UserInfoService {
    mappings: Arc<dyn ClaimMappingRepository>,
    user_claims: Arc<dyn UserClaimRepository>,
}

impl UserInfoService {
    pub fn new(
        mappings: Arc<dyn ClaimMappingRepository>,
        user_claims: Arc<dyn UserClaimRepository>,
    ) -> Self {
        Self {
            mappings,
            user_claims,
        }
    }

    /// Claims for the principal of an access token's authorization.
    #[instrument(skip(self, authorization), fields(authorization_id = %authorization.id))]
    pub async fn user_info(&self, authorization: &AuthorizationRecord) -> Result<Map<String, Value>> {
        let subject = authorization.principal_name.as_str();

        let Some(registration_id) = authorization.registration_id() else {
            return Ok(subject_only(subject));
        };

        let scopes = claim_scopes(&authorization.authorized_scopes);
        if scopes.is_empty() {
            return Ok(subject_only(subject));
        }

        let mappings = self
            .mappings
            .find_by_registration_id_and_scopes(&registration_id, &scopes)
            .await?;
        if mappings.is_empty() {
            debug!("No claim mappings for registration {}", registration_id);
            return Ok(subject_only(subject));
        }

        let user_claims = self.user_claims.find_by_user_id(subject).await?;

        Ok(build_claims(
            subject,
            &authorization.authorized_scopes,
            Some(&registration_id),
            &mappings,
            &user_claims,
        ))
    }
}
