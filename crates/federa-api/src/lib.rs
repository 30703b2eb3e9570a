//! Federa API - HTTP surface of the OIDC broker
//!
//! - Tenant resolution from the first path segment
//! - Discovery, JWKS and user-info per tenant
//! - RP-initiated logout and the upstream logout callback
//! - In-memory user pool administration

pub mod client_info;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiSettings, AppState, Collaborators};
