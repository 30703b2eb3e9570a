//! Upstream registration repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{instrument, warn};

use federa_core::{
    RegisteredUpstream, RegistrationId, Result, TenantId, UpstreamLogoutStyle,
    UpstreamRegistration, UpstreamRegistrationRepository,
};

use crate::db_err;

/// PostgreSQL implementation of UpstreamRegistrationRepository
pub struct PgUpstreamRegistrationRepository {
    pool: PgPool,
}

impl PgUpstreamRegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegistrationRow {
    registration_id: String,
    pool_name: String,
    client_id: String,
    client_secret: String,
    client_authentication_method: String,
    authorization_grant_type: String,
    redirect_uri: String,
    provider_name: String,
    authorization_uri: String,
    token_uri: String,
    user_info_uri: String,
    jwk_set_uri: String,
    user_name_attribute: String,
    issuer_uri: Option<String>,
    end_session_endpoint: Option<String>,
    scopes: Vec<String>,
    logout_style: Option<String>,
}

fn parse_logout_style(registration_id: &str, value: Option<&str>) -> Option<UpstreamLogoutStyle> {
    match value.map(str::trim) {
        None | Some("") => None,
        Some(s) if s.eq_ignore_ascii_case("standard") => Some(UpstreamLogoutStyle::Standard),
        Some(s) if s.eq_ignore_ascii_case("client_bound") => Some(UpstreamLogoutStyle::ClientBound),
        Some(other) => {
            warn!(registration_id, "Ignoring unknown logout style '{}'", other);
            None
        }
    }
}

impl From<RegistrationRow> for RegisteredUpstream {
    fn from(row: RegistrationRow) -> Self {
        let logout_style = parse_logout_style(&row.registration_id, row.logout_style.as_deref());
        Self {
            tenant_id: TenantId::new(row.pool_name),
            registration: UpstreamRegistration {
                registration_id: RegistrationId::new(row.registration_id),
                client_id: row.client_id,
                client_secret: row.client_secret,
                client_authentication_method: row.client_authentication_method,
                authorization_grant_type: row.authorization_grant_type,
                redirect_uri: row.redirect_uri,
                provider_name: row.provider_name,
                authorization_uri: row.authorization_uri,
                token_uri: row.token_uri,
                user_info_uri: row.user_info_uri,
                jwk_set_uri: row.jwk_set_uri,
                user_name_attribute: row.user_name_attribute,
                issuer_uri: row.issuer_uri,
                end_session_endpoint: row.end_session_endpoint,
                scopes: row.scopes,
                logout_style,
            },
        }
    }
}

#[async_trait]
impl UpstreamRegistrationRepository for PgUpstreamRegistrationRepository {
    #[instrument(skip(self))]
    async fn list_active(&self) -> Result<Vec<RegisteredUpstream>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT r.registration_id, p.pool_name, r.client_id, r.client_secret,
                   r.client_authentication_method, r.authorization_grant_type,
                   r.redirect_uri, r.provider_name, r.authorization_uri, r.token_uri,
                   r.user_info_uri, r.jwk_set_uri, r.user_name_attribute,
                   r.issuer_uri, r.end_session_endpoint, r.scopes, r.logout_style
            FROM client_registration r
            JOIN user_pool p ON p.user_pool_id = r.user_pool_id
            WHERE r.is_active = TRUE AND p.is_active = TRUE
            ORDER BY r.registration_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(RegisteredUpstream::from).collect())
    }
}
