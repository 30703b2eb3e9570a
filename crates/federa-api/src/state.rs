//! Application state for API handlers

use sqlx::PgPool;
use std::sync::Arc;

use federa_core::{
    AuditRepository, AuthorizationStore, ClaimMappingRepository, RegisteredClientRepository,
    SessionStore, UserClaimRepository,
};
use federa_oidc::{
    EndSessionDiscovery, FederatedLoginService, LoginStateStore, LogoutOrchestrator,
    LogoutSettings, LogoutStateStore, TokenClaimCustomizer, UpstreamAuthorizer, UserInfoService,
};
use federa_registry::{TenantRegistry, UpstreamRegistrationRegistry};

/// HTTP-facing broker settings
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Issuer base, e.g. `https://auth.example.com`
    pub public_base_url: String,
    pub session_cookie_name: String,
    pub error_path: String,
    pub logout_complete_path: String,
    /// Bearer key guarding `/resources`; open when unset
    pub admin_api_key: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            session_cookie_name: "FEDERA_SESSION".to_string(),
            error_path: "/error".to_string(),
            logout_complete_path: "/logout/complete".to_string(),
            admin_api_key: None,
        }
    }
}

/// Stores and repositories the broker delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub authorizations: Arc<dyn AuthorizationStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub clients: Arc<dyn RegisteredClientRepository>,
    pub mappings: Arc<dyn ClaimMappingRepository>,
    pub user_claims: Arc<dyn UserClaimRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

/// Concrete application state with all services
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ApiSettings>,
    /// Absent when running without a database (tests, in-memory mode)
    pub db_pool: Option<PgPool>,
    pub tenants: Arc<TenantRegistry>,
    pub upstreams: Arc<UpstreamRegistrationRegistry>,
    pub logout_states: Arc<LogoutStateStore>,
    pub login_states: Arc<LoginStateStore>,
    pub authorizations: Arc<dyn AuthorizationStore>,
    pub logout: Arc<LogoutOrchestrator>,
    pub user_info: Arc<UserInfoService>,
    pub authorizer: Arc<UpstreamAuthorizer>,
    pub end_session_discovery: EndSessionDiscovery,
    /// Hooks handed to the authorization-server engine
    pub federation: Arc<FederatedLoginService>,
    pub token_customizer: Arc<TokenClaimCustomizer>,
}

impl AppState {
    pub fn new(
        settings: ApiSettings,
        tenants: Arc<TenantRegistry>,
        upstreams: Arc<UpstreamRegistrationRegistry>,
        logout_states: Arc<LogoutStateStore>,
        login_states: Arc<LoginStateStore>,
        collaborators: Collaborators,
    ) -> Self {
        let logout_settings = LogoutSettings {
            public_base_url: settings.public_base_url.clone(),
            error_path: settings.error_path.clone(),
            logout_complete_path: settings.logout_complete_path.clone(),
        };

        let logout = LogoutOrchestrator::new(
            collaborators.authorizations.clone(),
            collaborators.sessions.clone(),
            collaborators.clients.clone(),
            upstreams.clone(),
            logout_states.clone(),
            collaborators.audit.clone(),
            logout_settings,
        );

        let federation = FederatedLoginService::new(
            tenants.clone(),
            upstreams.clone(),
            login_states.clone(),
            collaborators.authorizations.clone(),
            collaborators.mappings.clone(),
            collaborators.user_claims.clone(),
            collaborators.audit.clone(),
        );

        Self {
            user_info: Arc::new(UserInfoService::new(
                collaborators.mappings.clone(),
                collaborators.user_claims.clone(),
            )),
            authorizer: Arc::new(UpstreamAuthorizer::new(
                upstreams.clone(),
                collaborators.clients.clone(),
                login_states.clone(),
                settings.public_base_url.clone(),
            )),
            token_customizer: Arc::new(TokenClaimCustomizer::new(upstreams.clone())),
            federation: Arc::new(federation),
            logout: Arc::new(logout),
            end_session_discovery: EndSessionDiscovery::new(),
            authorizations: collaborators.authorizations,
            settings: Arc::new(settings),
            db_pool: None,
            tenants,
            upstreams,
            logout_states,
            login_states,
        }
    }

    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}
