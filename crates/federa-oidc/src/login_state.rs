//! Pending upstream logins
//!
//! Each redirect to an upstream IdP gets a fresh `state` and `nonce`. The
//! return leg consumes the entry once, so a replayed or forged callback finds
//! nothing to match.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use federa_core::{
    BrokerError, PendingLogin, RegistrationId, Result, TenantId, DEFAULT_LOGIN_STATE_TTL_SECS,
};

use crate::state_store::{random_token, spawn_periodic_sweep};

pub struct LoginStateStore {
    pending: DashMap<String, PendingLogin>,
    ttl: Duration,
}

impl Default for LoginStateStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LOGIN_STATE_TTL_SECS))
    }
}

impl LoginStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn save(
        &self,
        tenant_id: &TenantId,
        registration_id: &RegistrationId,
        client_id: &str,
    ) -> PendingLogin {
        self.save_at(tenant_id, registration_id, client_id, Utc::now())
    }

    pub fn save_at(
        &self,
        tenant_id: &TenantId,
        registration_id: &RegistrationId,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> PendingLogin {
        let pending = PendingLogin {
            state: random_token(),
            nonce: random_token(),
            tenant_id: tenant_id.clone(),
            registration_id: registration_id.clone(),
            client_id: client_id.to_string(),
            expiry_time: now + self.ttl,
        };
        self.pending.insert(pending.state.clone(), pending.clone());
        debug!("Saved login state, {} pending", self.pending.len());
        pending
    }

    pub fn consume(&self, state: &str) -> Result<PendingLogin> {
        self.consume_at(state, Utc::now())
    }

    pub fn consume_at(&self, state: &str, now: DateTime<Utc>) -> Result<PendingLogin> {
        if state.trim().is_empty() {
            return Err(BrokerError::missing_field("state"));
        }

        let (_, pending) = self
            .pending
            .remove(state)
            .ok_or_else(|| BrokerError::validation("state", "unknown or already used"))?;

        if pending.is_expired_at(now) {
            return Err(BrokerError::validation("state", "login has expired"));
        }

        Ok(pending)
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| !p.is_expired_at(now));
        before.saturating_sub(self.pending.len())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn spawn_sweeper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        spawn_periodic_sweep("login states", every, move || self.sweep_expired())
    }
}
