//! Downstream client lookups

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use federa_core::{RegisteredClient, RegisteredClientRepository, Result, TenantId};

use crate::db_err;

/// PostgreSQL implementation of RegisteredClientRepository
pub struct PgRegisteredClientRepository {
    pool: PgPool,
}

impl PgRegisteredClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegisteredClientRow {
    client_id: String,
    pool_name: String,
    post_logout_redirect_uris: Vec<String>,
}

impl From<RegisteredClientRow> for RegisteredClient {
    fn from(row: RegisteredClientRow) -> Self {
        Self {
            client_id: row.client_id,
            tenant_id: TenantId::new(row.pool_name),
            post_logout_redirect_uris: row.post_logout_redirect_uris.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RegisteredClientRepository for PgRegisteredClientRepository {
    #[instrument(skip(self))]
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<RegisteredClient>> {
        let row = sqlx::query_as::<_, RegisteredClientRow>(
            r#"
            SELECT c.client_id, p.pool_name, c.post_logout_redirect_uris
            FROM registered_client c
            JOIN user_pool p ON p.user_pool_id = c.user_pool_id
            WHERE c.client_id = $1 AND p.is_active = TRUE
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(RegisteredClient::from))
    }
}
