//! Logout State Store
//!
//! Short-lived `state` tokens binding an upstream logout round trip to the
//! client's final redirect URI. A state is consumed at most once: removal and
//! retrieval are a single map operation, and expiry is re-checked on read so
//! the sweeper is housekeeping only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use federa_core::{BrokerError, LogoutState, Result, DEFAULT_LOGOUT_STATE_TTL_SECS};

/// Random URL-safe token with 256 bits of entropy
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct LogoutStateStore {
    states: DashMap<String, LogoutState>,
    ttl: Duration,
}

impl Default for LogoutStateStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LOGOUT_STATE_TTL_SECS))
    }
}

impl LogoutStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a fresh state for `client_final_redirect_uri`.
    pub fn save(&self, client_final_redirect_uri: &str, client_state: Option<String>) -> String {
        self.save_at(client_final_redirect_uri, client_state, Utc::now())
    }

    pub fn save_at(
        &self,
        client_final_redirect_uri: &str,
        client_state: Option<String>,
        now: DateTime<Utc>,
    ) -> String {
        let state = random_token();
        self.states.insert(
            state.clone(),
            LogoutState {
                state: state.clone(),
                client_final_redirect_uri: client_final_redirect_uri.to_string(),
                client_state,
                expiry_time: now + self.ttl,
            },
        );
        debug!("Saved logout state, {} pending", self.states.len());
        state
    }

    /// Remove and return the state. A second call for the same value fails.
    pub fn consume(&self, state: &str) -> Result<LogoutState> {
        self.consume_at(state, Utc::now())
    }

    pub fn consume_at(&self, state: &str, now: DateTime<Utc>) -> Result<LogoutState> {
        if state.trim().is_empty() {
            return Err(BrokerError::logout_state("state is missing"));
        }

        let (_, entry) = self
            .states
            .remove(state)
            .ok_or_else(|| BrokerError::logout_state("state is unknown or already used"))?;

        if entry.is_expired_at(now) {
            return Err(BrokerError::logout_state("state has expired"));
        }

        Ok(entry)
    }

    /// Drop every state past its expiry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.states.len();
        self.states.retain(|_, s| !s.is_expired_at(now));
        before.saturating_sub(self.states.len())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Run [`Self::sweep_expired`] on a fixed interval until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        spawn_periodic_sweep("logout states", every, move || self.sweep_expired())
    }
}

/// Call `sweep` on a fixed interval until the task is aborted.
pub(crate) fn spawn_periodic_sweep<F>(
    label: &'static str,
    every: std::time::Duration,
    sweep: F,
) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = sweep();
            if removed > 0 {
                debug!("Swept {} expired {}", removed, label);
            }
        }
    })
}
