//! Issuer and per-request tenant context
//!
//! Each tenant gets its own issuer, `https://<host>/<tenant>`. The tenant id is
//! always the first path segment of that issuer. A [`TenantContext`] is built
//! once per request and passed explicitly to everything that needs it, so it
//! lives exactly as long as the request that produced it.

use url::Url;

use crate::error::{BrokerError, Result};
use crate::ids::TenantId;

/// Extract the tenant id from an issuer URL.
///
/// An issuer without a path segment means the server cannot tell which tenant
/// it is serving; that is a configuration error rather than a client error.
pub fn tenant_id_from_issuer(issuer: &str) -> Result<TenantId> {
    if issuer.trim().is_empty() {
        return Err(BrokerError::configuration("issuer is not available"));
    }

    let url = Url::parse(issuer)
        .map_err(|e| BrokerError::configuration(format!("malformed issuer '{}': {}", issuer, e)))?;

    url.path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(TenantId::from)
        .ok_or_else(|| {
            BrokerError::configuration(format!("issuer '{}' has no tenant path segment", issuer))
        })
}

/// Build a tenant issuer from the public base URL.
pub fn tenant_issuer(public_base_url: &str, tenant_id: &TenantId) -> String {
    format!("{}/{}", public_base_url.trim_end_matches('/'), tenant_id)
}

/// Request-scoped tenant resolution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    issuer: String,
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn from_issuer(issuer: impl Into<String>) -> Result<Self> {
        let issuer = issuer.into();
        let tenant_id = tenant_id_from_issuer(&issuer)?;
        Ok(Self { issuer, tenant_id })
    }

    /// Compute the issuer the current request is addressed to.
    ///
    /// `request_path` is the path of the inbound request; its first segment
    /// selects the tenant.
    pub fn for_request(public_base_url: &str, request_path: &str) -> Result<Self> {
        let segment = request_path
            .split('/')
            .find(|s| !s.is_empty())
            .ok_or_else(|| {
                BrokerError::validation("issuer", "request path has no tenant segment")
            })?;

        let tenant_id = TenantId::from(segment);
        Ok(Self {
            issuer: tenant_issuer(public_base_url, &tenant_id),
            tenant_id,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}
