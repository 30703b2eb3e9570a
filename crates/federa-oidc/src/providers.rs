//! Upstream provider metadata discovery

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use federa_core::{BrokerError, Result, UpstreamRegistration};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// `<issuer>/.well-known/openid-configuration`
pub fn discovery_url(issuer: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    )
}

/// The subset of upstream metadata the broker uses
#[derive(Debug, Deserialize)]
pub struct UpstreamMetadata {
    pub issuer: Option<String>,
    pub end_session_endpoint: Option<String>,
}

/// Fetches end-session endpoints of registrations that only name an issuer
#[derive(Clone)]
pub struct EndSessionDiscovery {
    client: reqwest::Client,
}

impl Default for EndSessionDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl EndSessionDiscovery {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, issuer: &str) -> Result<UpstreamMetadata> {
        let response = self
            .client
            .get(discovery_url(issuer))
            .send()
            .await
            .map_err(|e| BrokerError::upstream(format!("discovery request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BrokerError::upstream(format!(
                "discovery returned status {}",
                response.status()
            )));
        }

        response
            .json::<UpstreamMetadata>()
            .await
            .map_err(|e| BrokerError::upstream(format!("invalid discovery document: {}", e)))
    }

    /// Fill in `end_session_endpoint` from the issuer's metadata when absent.
    ///
    /// Failure leaves the registration without an endpoint; logout through it
    /// then stays local.
    pub async fn resolve(&self, registration: &mut UpstreamRegistration) {
        if registration.end_session_endpoint().is_some() {
            return;
        }
        let Some(issuer) = registration
            .issuer_uri
            .clone()
            .filter(|i| !i.trim().is_empty())
        else {
            return;
        };

        match self.fetch(&issuer).await {
            Ok(metadata) => {
                debug!(
                    registration_id = %registration.registration_id,
                    found = metadata.end_session_endpoint.is_some(),
                    "Discovered upstream metadata"
                );
                registration.end_session_endpoint = metadata.end_session_endpoint;
            }
            Err(e) => warn!(
                registration_id = %registration.registration_id,
                "End-session discovery failed: {}",
                e
            ),
        }
    }
}
