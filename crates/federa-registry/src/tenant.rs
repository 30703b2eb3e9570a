//! Tenant Registry - typed per-tenant components
//!
//! Components are stored in one bucket per tenant, keyed by a closed set of
//! component kinds. Lookups resolve the tenant from the request's
//! [`TenantContext`], so one tenant can never observe another tenant's bucket.

use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use federa_core::{
    tenant_id_from_issuer, BrokerError, Result, SigningKeySet, TenantContext, TenantId, TenantMetadata,
    UserPool, UserPoolId,
};

/// Known per-tenant component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    SigningKeys,
    Metadata,
}

/// A stored per-tenant component
#[derive(Debug, Clone)]
pub enum TenantComponent {
    SigningKeys(Arc<SigningKeySet>),
    Metadata(Arc<TenantMetadata>),
}

impl TenantComponent {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::SigningKeys(_) => ComponentKind::SigningKeys,
            Self::Metadata(_) => ComponentKind::Metadata,
        }
    }
}

/// Ties a component type to its [`ComponentKind`] so lookups stay typed.
pub trait TypedComponent: Send + Sync + Sized + 'static {
    const KIND: ComponentKind;

    fn into_component(self: Arc<Self>) -> TenantComponent;

    fn from_component(component: &TenantComponent) -> Option<Arc<Self>>;
}

impl TypedComponent for SigningKeySet {
    const KIND: ComponentKind = ComponentKind::SigningKeys;

    fn into_component(self: Arc<Self>) -> TenantComponent {
        TenantComponent::SigningKeys(self)
    }

    fn from_component(component: &TenantComponent) -> Option<Arc<Self>> {
        match component {
            TenantComponent::SigningKeys(keys) => Some(keys.clone()),
            _ => None,
        }
    }
}

impl TypedComponent for TenantMetadata {
    const KIND: ComponentKind = ComponentKind::Metadata;

    fn into_component(self: Arc<Self>) -> TenantComponent {
        TenantComponent::Metadata(self)
    }

    fn from_component(component: &TenantComponent) -> Option<Arc<Self>> {
        match component {
            TenantComponent::Metadata(metadata) => Some(metadata.clone()),
            _ => None,
        }
    }
}

/// Registry of per-tenant components
#[derive(Default)]
pub struct TenantRegistry {
    buckets: DashMap<TenantId, HashMap<ComponentKind, TenantComponent>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `component` for `tenant_id`, replacing any previous one of the same kind.
    #[instrument(skip(self, component), fields(kind = ?T::KIND))]
    pub fn register<T: TypedComponent>(&self, tenant_id: &TenantId, component: impl Into<Arc<T>>) {
        debug!("Registering tenant component");
        self.buckets
            .entry(tenant_id.clone())
            .or_default()
            .insert(T::KIND, component.into().into_component());
    }

    /// Parse the pool's key set and register it together with the pool metadata.
    ///
    /// Nothing is stored when the key set is unusable.
    #[instrument(skip(self, pool), fields(pool_name = %pool.pool_name))]
    pub fn register_user_pool(&self, pool: &UserPool) -> Result<TenantId> {
        let keys = SigningKeySet::parse(&pool.jwk_set)?;
        let tenant_id = pool.tenant_id();

        let metadata = TenantMetadata {
            user_pool_id: pool.user_pool_id.clone(),
            pool_name: pool.pool_name.clone(),
            allowed_scopes: pool.scopes.clone(),
        };

        self.register::<SigningKeySet>(&tenant_id, keys);
        self.register::<TenantMetadata>(&tenant_id, metadata);

        info!("Registered tenant {}", tenant_id);
        Ok(tenant_id)
    }

    /// Like [`Self::register_user_pool`], but refuses a tenant that already
    /// has a bucket. The check and the insert are one map operation.
    #[instrument(skip(self, pool), fields(pool_name = %pool.pool_name))]
    pub fn register_new_user_pool(&self, pool: &UserPool) -> Result<TenantId> {
        let keys = SigningKeySet::parse(&pool.jwk_set)?;
        let tenant_id = pool.tenant_id();

        let metadata = TenantMetadata {
            user_pool_id: pool.user_pool_id.clone(),
            pool_name: pool.pool_name.clone(),
            allowed_scopes: pool.scopes.clone(),
        };

        match self.buckets.entry(tenant_id.clone()) {
            Entry::Occupied(_) => {
                return Err(BrokerError::conflict(format!(
                    "user pool {} is already registered",
                    tenant_id
                )))
            }
            Entry::Vacant(slot) => {
                let bucket = HashMap::from([
                    (ComponentKind::SigningKeys, Arc::new(keys).into_component()),
                    (ComponentKind::Metadata, Arc::new(metadata).into_component()),
                ]);
                slot.insert(bucket);
            }
        }

        info!("Registered new tenant {}", tenant_id);
        Ok(tenant_id)
    }

    /// Component of the tenant the current request is addressed to.
    pub fn get<T: TypedComponent>(&self, context: &TenantContext) -> Option<Arc<T>> {
        self.get_for_tenant(context.tenant_id())
    }

    /// Resolve the tenant from a raw issuer string.
    ///
    /// An issuer that cannot be resolved is a configuration error; there is no
    /// fallback tenant.
    pub fn get_by_issuer<T: TypedComponent>(&self, issuer: &str) -> Result<Option<Arc<T>>> {
        let tenant_id = tenant_id_from_issuer(issuer)?;
        Ok(self.get_for_tenant(&tenant_id))
    }

    pub fn get_for_tenant<T: TypedComponent>(&self, tenant_id: &TenantId) -> Option<Arc<T>> {
        self.buckets
            .get(tenant_id)
            .and_then(|bucket| bucket.get(&T::KIND).and_then(T::from_component))
    }

    /// Every registered instance of `T`, across tenants
    pub fn get_all<T: TypedComponent>(&self) -> Vec<Arc<T>> {
        self.buckets
            .iter()
            .filter_map(|bucket| bucket.get(&T::KIND).and_then(T::from_component))
            .collect()
    }

    pub fn contains(&self, tenant_id: &TenantId) -> bool {
        self.buckets.contains_key(tenant_id)
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.buckets.iter().map(|b| b.key().clone()).collect()
    }

    /// Drop the whole bucket of a tenant; returns whether it existed.
    #[instrument(skip(self))]
    pub fn remove(&self, tenant_id: &TenantId) -> bool {
        let removed = self.buckets.remove(tenant_id).is_some();
        if removed {
            info!("Removed tenant {}", tenant_id);
        }
        removed
    }

    pub fn find_metadata_by_pool_id(&self, user_pool_id: &UserPoolId) -> Option<Arc<TenantMetadata>> {
        self.get_all::<TenantMetadata>()
            .into_iter()
            .find(|m| &m.user_pool_id == user_pool_id)
    }

    pub fn find_metadata_by_pool_name(&self, pool_name: &str) -> Option<Arc<TenantMetadata>> {
        self.get_all::<TenantMetadata>()
            .into_iter()
            .find(|m| m.pool_name == pool_name)
    }
}
