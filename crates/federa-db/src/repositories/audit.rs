//! Auth activity repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use federa_core::{AuditRepository, AuthActivity, Result};

use crate::db_err;

/// PostgreSQL implementation of AuditRepository
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    #[instrument(skip(self, activity), fields(action = activity.action.as_str(), outcome = %activity.outcome))]
    async fn record(&self, activity: &AuthActivity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_activity
                (auth_id, tenant_id, user_id, action, outcome,
                 ip, device_type, os_name, os_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(activity.auth_id.as_ref().map(|id| id.as_str()))
        .bind(activity.tenant_id.as_ref().map(|id| id.as_str()))
        .bind(activity.user_id.as_deref())
        .bind(activity.action.as_str())
        .bind(&activity.outcome)
        .bind(activity.ip.as_deref())
        .bind(&activity.device_type)
        .bind(&activity.os_name)
        .bind(&activity.os_version)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
