//! Collaborator traits for the Federa broker
//!
//! The authorization-server engine and the persistence layer live behind
//! these seams; the broker only depends on the operations listed here.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::{error::Result, ids::*, models::*};

// =============================================================================
// Authorization-Server Engine
// =============================================================================

/// Authorization record storage owned by the authorization-server engine
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// Look up the record that issued `token` as a token of `kind`
    async fn find_by_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<AuthorizationRecord>>;

    async fn find_by_id(&self, id: &AuthorizationId) -> Result<Option<AuthorizationRecord>>;

    /// Insert or replace a record, including its attribute bag
    async fn save(&self, record: &AuthorizationRecord) -> Result<()>;

    async fn remove(&self, id: &AuthorizationId) -> Result<()>;
}

/// Local HTTP session management
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Invalidate a session; returns whether it existed
    async fn invalidate(&self, session_id: &str) -> Result<bool>;
}

// =============================================================================
// Persistence
// =============================================================================

#[async_trait]
pub trait UserPoolRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<UserPool>>;
    async fn find_by_pool_name(&self, pool_name: &str) -> Result<Option<UserPool>>;
}

#[async_trait]
pub trait UpstreamRegistrationRepository: Send + Sync {
    /// All active registrations with the tenant that owns them
    async fn list_active(&self) -> Result<Vec<RegisteredUpstream>>;
}

/// Downstream clients registered with the broker
#[async_trait]
pub trait RegisteredClientRepository: Send + Sync {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<RegisteredClient>>;

    async fn find_tenant_id_by_client_id(&self, client_id: &str) -> Result<Option<TenantId>> {
        Ok(self
            .find_by_client_id(client_id)
            .await?
            .map(|client| client.tenant_id))
    }
}

#[async_trait]
pub trait ClaimMappingRepository: Send + Sync {
    /// Active mappings of a registration
    async fn find_by_registration_id(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<Vec<ClaimMapping>>;

    /// Active mappings of a registration restricted to `scopes` (case-insensitive)
    async fn find_by_registration_id_and_scopes(
        &self,
        registration_id: &RegistrationId,
        scopes: &BTreeSet<String>,
    ) -> Result<Vec<ClaimMapping>>;

    async fn save_all(&self, mappings: &[ClaimMapping]) -> Result<()>;
}

#[async_trait]
pub trait UserClaimRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<UserClaim>>;

    /// Insert or refresh claims keyed by (user id, claim name)
    async fn save_all(&self, claims: &[UserClaim]) -> Result<()>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, activity: &AuthActivity) -> Result<()>;
}
