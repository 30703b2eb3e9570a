//! Federa Core - Domain types and collaborator traits for the OIDC broker

pub mod context;
pub mod error;
pub mod ids;
pub mod memory;
pub mod models;
pub mod traits;


pub use context::*;
pub use error::*;
pub use ids::*;
pub use models::*;
pub use traits::*;
