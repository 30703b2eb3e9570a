//! Federa Registry - in-memory per-tenant catalogues
//!
//! Both registries are read on every request and written only by startup
//! loading and the admin endpoints.

pub mod tenant;
pub mod upstream;


pub use tenant::{ComponentKind, TenantComponent, TenantRegistry, TypedComponent};
pub use upstream::UpstreamRegistrationRegistry;
