//! In-memory collaborator implementations
//!
//! Used by tests and by single-process deployments where the
//! authorization-server engine keeps its records in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::{Mutex, RwLock};

use crate::{error::Result, ids::*, models::*, traits::*, BrokerError};

// =============================================================================
// Authorization Records
// =============================================================================

#[derive(Default)]
pub struct InMemoryAuthorizationStore {
    records: DashMap<AuthorizationId, AuthorizationRecord>,
}

impl InMemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn find_by_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<AuthorizationRecord>> {
        Ok(self
            .records
            .iter()
            .find(|entry| {
                entry
                    .value()
                    .token(kind)
                    .map(|t| t.value == token)
                    .unwrap_or(false)
            })
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: &AuthorizationId) -> Result<Option<AuthorizationRecord>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn save(&self, record: &AuthorizationRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, id: &AuthorizationId) -> Result<()> {
        self.records.remove(id);
        Ok(())
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, DateTime<Utc>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, session_id: impl Into<String>) {
        self.sessions.insert(session_id.into(), Utc::now());
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn invalidate(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.remove(session_id).is_some())
    }
}

// =============================================================================
// Tenants & Registrations
// =============================================================================

#[derive(Default)]
pub struct InMemoryUserPoolRepository {
    pools: RwLock<Vec<UserPool>>,
}

impl InMemoryUserPoolRepository {
    pub fn new(pools: Vec<UserPool>) -> Self {
        Self {
            pools: RwLock::new(pools),
        }
    }
}

#[async_trait]
impl UserPoolRepository for InMemoryUserPoolRepository {
    async fn list_active(&self) -> Result<Vec<UserPool>> {
        let pools = self
            .pools
            .read()
            .map_err(|_| BrokerError::internal_error("user pool lock poisoned"))?;
        Ok(pools.iter().filter(|p| p.is_active).cloned().collect())
    }

    async fn find_by_pool_name(&self, pool_name: &str) -> Result<Option<UserPool>> {
        let pools = self
            .pools
            .read()
            .map_err(|_| BrokerError::internal_error("user pool lock poisoned"))?;
        Ok(pools
            .iter()
            .find(|p| p.is_active && p.pool_name == pool_name)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryUpstreamRegistrationRepository {
    registrations: RwLock<Vec<RegisteredUpstream>>,
}

impl InMemoryUpstreamRegistrationRepository {
    pub fn new(registrations: Vec<RegisteredUpstream>) -> Self {
        Self {
            registrations: RwLock::new(registrations),
        }
    }
}

#[async_trait]
impl UpstreamRegistrationRepository for InMemoryUpstreamRegistrationRepository {
    async fn list_active(&self) -> Result<Vec<RegisteredUpstream>> {
        let registrations = self
            .registrations
            .read()
            .map_err(|_| BrokerError::internal_error("registration lock poisoned"))?;
        Ok(registrations.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRegisteredClientRepository {
    clients: DashMap<String, RegisteredClient>,
}

impl InMemoryRegisteredClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client without post-logout redirect URIs
    pub fn register(&self, client_id: impl Into<String>, tenant_id: TenantId) {
        self.insert(RegisteredClient::new(client_id, tenant_id));
    }

    pub fn insert(&self, client: RegisteredClient) {
        self.clients.insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl RegisteredClientRepository for InMemoryRegisteredClientRepository {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

// =============================================================================
// Claims
// =============================================================================

#[derive(Default)]
pub struct InMemoryClaimMappingRepository {
    mappings: RwLock<Vec<ClaimMapping>>,
}

impl InMemoryClaimMappingRepository {
    pub fn new(mappings: Vec<ClaimMapping>) -> Self {
        Self {
            mappings: RwLock::new(mappings),
        }
    }

    fn read_effective(&self, registration_id: &RegistrationId) -> Result<Vec<ClaimMapping>> {
        let mappings = self
            .mappings
            .read()
            .map_err(|_| BrokerError::internal_error("claim mapping lock poisoned"))?;
        Ok(mappings
            .iter()
            .filter(|m| &m.registration_id == registration_id && m.is_effective())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClaimMappingRepository for InMemoryClaimMappingRepository {
    async fn find_by_registration_id(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<Vec<ClaimMapping>> {
        self.read_effective(registration_id)
    }

    async fn find_by_registration_id_and_scopes(
        &self,
        registration_id: &RegistrationId,
        scopes: &BTreeSet<String>,
    ) -> Result<Vec<ClaimMapping>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: BTreeSet<String> = scopes.iter().map(|s| s.to_lowercase()).collect();
        Ok(self
            .read_effective(registration_id)?
            .into_iter()
            .filter(|m| wanted.contains(&m.scope.to_lowercase()))
            .collect())
    }

    async fn save_all(&self, new_mappings: &[ClaimMapping]) -> Result<()> {
        let mut mappings = self
            .mappings
            .write()
            .map_err(|_| BrokerError::internal_error("claim mapping lock poisoned"))?;
        for mapping in new_mappings {
            let exists = mappings.iter().any(|m| {
                m.registration_id == mapping.registration_id
                    && m.claim_name == mapping.claim_name
                    && m.scope == mapping.scope
            });
            if !exists {
                mappings.push(mapping.clone());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserClaimRepository {
    claims: DashMap<String, Vec<UserClaim>>,
}

impl InMemoryUserClaimRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserClaimRepository for InMemoryUserClaimRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<UserClaim>> {
        Ok(self
            .claims
            .get(user_id)
            .map(|c| c.value().clone())
            .unwrap_or_default())
    }

    async fn save_all(&self, claims: &[UserClaim]) -> Result<()> {
        for claim in claims {
            let mut entry = self.claims.entry(claim.user_id.clone()).or_default();
            if let Some(pos) = entry.iter().position(|c| c.claim_name == claim.claim_name) {
                entry[pos].value = claim.value.clone();
            } else {
                entry.push(claim.clone());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Audit
// =============================================================================

#[derive(Default)]
pub struct InMemoryAuditRepository {
    activities: Mutex<Vec<AuthActivity>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activities(&self) -> Vec<AuthActivity> {
        self.activities
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn record(&self, activity: &AuthActivity) -> Result<()> {
        self.activities
            .lock()
            .map_err(|_| BrokerError::internal_error("audit lock poisoned"))?
            .push(activity.clone());
        Ok(())
    }
}
