//! OIDC federation flows for Federa
//!
//! Logout orchestration, user-info claims, token claim customization,
//! discovery metadata and the upstream side of federated login.

pub mod audit;
pub mod authorize;
pub mod claims;
pub mod discovery;
pub mod federation;
pub mod login_state;
pub mod logout;
pub mod providers;
pub mod state_store;
pub mod token;


pub use authorize::{UpstreamAuthorizer, UpstreamLoginRedirect};
pub use claims::{build_claims, UserInfoService};
pub use discovery::ProviderMetadata;
pub use federation::{FederatedLoginService, UpstreamLogin};
pub use login_state::LoginStateStore;
pub use logout::{LogoutOrchestrator, LogoutOutcome, LogoutRequest, LogoutSettings};
pub use providers::EndSessionDiscovery;
pub use state_store::LogoutStateStore;
pub use token::TokenClaimCustomizer;
