//! Startup loading of tenants and upstream registrations

use anyhow::{bail, Context, Result};
use tracing::info;

use federa_core::{UpstreamRegistrationRepository, UserPoolRepository};
use federa_oidc::EndSessionDiscovery;
use federa_registry::{TenantRegistry, UpstreamRegistrationRegistry};

/// Register every active user pool and upstream registration.
///
/// Any configuration error aborts startup; nothing is served half-loaded.
pub async fn load_registries(
    pools: &dyn UserPoolRepository,
    registrations: &dyn UpstreamRegistrationRepository,
    tenants: &TenantRegistry,
    upstreams: &UpstreamRegistrationRegistry,
    discovery: &EndSessionDiscovery,
) -> Result<()> {
    let active_pools = pools
        .list_active()
        .await
        .context("Failed to read user pools")?;
    for pool in &active_pools {
        tenants
            .register_user_pool(pool)
            .with_context(|| format!("Invalid user pool '{}'", pool.pool_name))?;
    }

    let active_registrations = registrations
        .list_active()
        .await
        .context("Failed to read upstream registrations")?;
    for mut registered in active_registrations {
        let registration_id = registered.registration.registration_id.clone();
        if !tenants.contains(&registered.tenant_id) {
            bail!(
                "Upstream registration '{}' belongs to unknown tenant '{}'",
                registration_id,
                registered.tenant_id
            );
        }
        discovery.resolve(&mut registered.registration).await;
        upstreams
            .register(&registered.tenant_id, registered.registration)
            .with_context(|| format!("Invalid upstream registration '{}'", registration_id))?;
    }

    info!(
        tenants = active_pools.len(),
        registrations = upstreams.len(),
        "Registries loaded"
    );
    Ok(())
}
