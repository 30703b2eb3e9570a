//! User pool repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use federa_core::{Result, UserPool, UserPoolId, UserPoolRepository};

use crate::db_err;

/// PostgreSQL implementation of UserPoolRepository
pub struct PgUserPoolRepository {
    pool: PgPool,
}

impl PgUserPoolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserPoolRow {
    user_pool_id: String,
    pool_name: String,
    scopes: Vec<String>,
    jwk_set: String,
    is_active: bool,
}

impl From<UserPoolRow> for UserPool {
    fn from(row: UserPoolRow) -> Self {
        Self {
            user_pool_id: UserPoolId::new(row.user_pool_id),
            pool_name: row.pool_name,
            scopes: row.scopes.into_iter().collect(),
            jwk_set: row.jwk_set,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl UserPoolRepository for PgUserPoolRepository {
    #[instrument(skip(self))]
    async fn list_active(&self) -> Result<Vec<UserPool>> {
        let rows = sqlx::query_as::<_, UserPoolRow>(
            r#"
            SELECT user_pool_id, pool_name, scopes, jwk_set, is_active
            FROM user_pool
            WHERE is_active = TRUE
            ORDER BY pool_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(UserPool::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_pool_name(&self, pool_name: &str) -> Result<Option<UserPool>> {
        let row = sqlx::query_as::<_, UserPoolRow>(
            r#"
            SELECT user_pool_id, pool_name, scopes, jwk_set, is_active
            FROM user_pool
            WHERE pool_name = $1 AND is_active = TRUE
            "#,
        )
        .bind(pool_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(UserPool::from))
    }
}
