//! Upstream Registration Registry
//!
//! In-memory catalogue of the broker's client configurations at upstream
//! identity providers, each tagged with the tenant that owns it.

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{info, instrument, warn};

use federa_core::{
    BrokerError, RegisteredUpstream, RegistrationId, Result, TenantId, UpstreamRegistration,
};

#[derive(Default)]
pub struct UpstreamRegistrationRegistry {
    registrations: DashMap<RegistrationId, RegisteredUpstream>,
}

impl UpstreamRegistrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a registration for `tenant_id`.
    ///
    /// The first missing field is reported and nothing is stored. An id that
    /// another tenant already owns is a conflict; the owning tenant may
    /// replace its own registration.
    #[instrument(
        skip(self, registration),
        fields(registration_id = %registration.registration_id, provider = %registration.provider_name)
    )]
    pub fn register(&self, tenant_id: &TenantId, registration: UpstreamRegistration) -> Result<()> {
        if let Err(e) = validate(tenant_id, &registration) {
            warn!("Rejected upstream registration: {}", e);
            return Err(e);
        }

        let registration_id = registration.registration_id.clone();
        let registered = RegisteredUpstream {
            registration,
            tenant_id: tenant_id.clone(),
        };
        match self.registrations.entry(registration_id.clone()) {
            Entry::Occupied(mut existing) => {
                if &existing.get().tenant_id != tenant_id {
                    warn!(
                        owner = %existing.get().tenant_id,
                        "Registration id is owned by another tenant"
                    );
                    return Err(BrokerError::conflict(format!(
                        "registration {} is owned by another tenant",
                        registration_id
                    )));
                }
                existing.insert(registered);
            }
            Entry::Vacant(slot) => {
                slot.insert(registered);
            }
        }

        info!(
            "Registered upstream {} for tenant {}",
            registration_id, tenant_id
        );
        Ok(())
    }

    pub fn get(&self, registration_id: &RegistrationId) -> Option<RegisteredUpstream> {
        self.registrations
            .get(registration_id)
            .map(|r| r.value().clone())
    }

    pub fn get_all(&self) -> Vec<RegisteredUpstream> {
        self.registrations.iter().map(|r| r.value().clone()).collect()
    }

    pub fn get_by_tenant(&self, tenant_id: &TenantId) -> Vec<RegisteredUpstream> {
        self.registrations
            .iter()
            .filter(|r| &r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .collect()
    }

    #[instrument(skip(self))]
    pub fn remove(&self, registration_id: &RegistrationId) -> Option<RegisteredUpstream> {
        let removed = self.registrations.remove(registration_id).map(|(_, r)| r);
        if removed.is_some() {
            info!("Removed upstream registration {}", registration_id);
        }
        removed
    }

    /// Remove every registration owned by `tenant_id`; returns how many went.
    #[instrument(skip(self))]
    pub fn remove_by_tenant(&self, tenant_id: &TenantId) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|_, r| &r.tenant_id != tenant_id);
        let removed = before.saturating_sub(self.registrations.len());
        info!("Removed {} upstream registrations of tenant {}", removed, tenant_id);
        removed
    }

    pub fn find_tenant_id_by_registration_id(
        &self,
        registration_id: &RegistrationId,
    ) -> Option<TenantId> {
        self.registrations
            .get(registration_id)
            .map(|r| r.tenant_id.clone())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BrokerError::missing_field(field));
    }
    Ok(())
}

/// Check every required field in a fixed order.
pub fn validate(tenant_id: &TenantId, registration: &UpstreamRegistration) -> Result<()> {
    require("registration_id", registration.registration_id.as_str())?;
    require("client_id", &registration.client_id)?;
    require("client_secret", &registration.client_secret)?;
    require(
        "client_authentication_method",
        &registration.client_authentication_method,
    )?;
    require(
        "authorization_grant_type",
        &registration.authorization_grant_type,
    )?;
    require("redirect_uri", &registration.redirect_uri)?;
    require("provider_name", &registration.provider_name)?;
    require("authorization_uri", &registration.authorization_uri)?;
    require("token_uri", &registration.token_uri)?;
    require("user_info_uri", &registration.user_info_uri)?;
    require("jwk_set_uri", &registration.jwk_set_uri)?;
    require("user_name_attribute", &registration.user_name_attribute)?;

    if !registration.scopes.iter().any(|s| !s.trim().is_empty()) {
        return Err(BrokerError::missing_field("scopes"));
    }

    require("tenant_id", tenant_id.as_str())
}
