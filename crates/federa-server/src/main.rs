//! Federa - Multi-tenant OIDC broker server

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod startup;

use config::Settings;
use federa_api::{AppState, Collaborators};
use federa_core::memory::{InMemoryAuthorizationStore, InMemorySessionStore};
use federa_db::{
    create_pool, run_migrations, DatabaseConfig, PgAuditRepository, PgClaimMappingRepository,
    PgRegisteredClientRepository, PgUpstreamRegistrationRepository, PgUserClaimRepository,
    PgUserPoolRepository,
};
use federa_oidc::{EndSessionDiscovery, LoginStateStore, LogoutStateStore};
use federa_registry::{TenantRegistry, UpstreamRegistrationRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;

    info!("Starting Federa OIDC broker v{}", env!("CARGO_PKG_VERSION"));
    info!(public_base_url = %settings.broker.public_base_url, "Configuration loaded");

    let state = initialize_services(&settings).await?;

    let sweep_every = Duration::from_secs(settings.broker.logout_sweep_interval_secs.max(1));
    let sweepers = [
        state.logout_states.clone().spawn_sweeper(sweep_every),
        state.login_states.clone().spawn_sweeper(sweep_every),
    ];

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    for sweeper in sweepers {
        sweeper.abort();
    }
    info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,federa=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn initialize_services(settings: &Settings) -> Result<AppState> {
    info!("Connecting to PostgreSQL...");
    let db_config = DatabaseConfig {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        ..DatabaseConfig::default()
    };

    let db_pool = create_pool(&db_config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&db_pool)
        .await
        .context("Failed to apply migrations")?;

    let tenants = Arc::new(TenantRegistry::new());
    let upstreams = Arc::new(UpstreamRegistrationRegistry::new());
    startup::load_registries(
        &PgUserPoolRepository::new(db_pool.clone()),
        &PgUpstreamRegistrationRepository::new(db_pool.clone()),
        &tenants,
        &upstreams,
        &EndSessionDiscovery::new(),
    )
    .await
    .context("Failed to load tenants")?;

    let logout_states = Arc::new(LogoutStateStore::new(chrono::Duration::seconds(
        settings.broker.logout_state_ttl_secs,
    )));
    let login_states = Arc::new(LoginStateStore::new(chrono::Duration::seconds(
        settings.broker.login_state_ttl_secs,
    )));

    // Records the authorization-server engine keeps in process
    let collaborators = Collaborators {
        authorizations: Arc::new(InMemoryAuthorizationStore::new()),
        sessions: Arc::new(InMemorySessionStore::new()),
        clients: Arc::new(PgRegisteredClientRepository::new(db_pool.clone())),
        mappings: Arc::new(PgClaimMappingRepository::new(db_pool.clone())),
        user_claims: Arc::new(PgUserClaimRepository::new(db_pool.clone())),
        audit: Arc::new(PgAuditRepository::new(db_pool.clone())),
    };

    let api_settings = settings.broker.api_settings();
    if api_settings.admin_api_key.is_none() {
        warn!("FEDERA__BROKER__ADMIN_API_KEY not set - admin endpoints are unauthenticated");
    }

    let state = AppState::new(
        api_settings,
        tenants,
        upstreams,
        logout_states,
        login_states,
        collaborators,
    )
    .with_db_pool(db_pool);

    info!("All services initialized successfully");
    Ok(state)
}

fn create_app(state: AppState) -> Router {
    let app = federa_api::create_router(state);

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
