//! Repository implementations for PostgreSQL

pub mod audit;
pub mod claims;
pub mod client;
pub mod registration;
pub mod user_pool;

pub use audit::*;
pub use claims::*;
pub use client::*;
pub use registration::*;
pub use user_pool::*;
