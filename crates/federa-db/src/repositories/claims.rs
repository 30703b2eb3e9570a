//! Claim mapping and captured user claim repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use federa_core::{
    ClaimMapping, ClaimMappingRepository, RegistrationId, Result, UserClaim,
    UserClaimRepository,
};

use crate::db_err;

const MAPPING_COLUMNS: &str = "registration_id, scope, idp_claim_name, claim_name, \
                               is_active, created_at, updated_at, deleted_at";

/// PostgreSQL implementation of ClaimMappingRepository
pub struct PgClaimMappingRepository {
    pool: PgPool,
}

impl PgClaimMappingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimMappingRow {
    registration_id: String,
    scope: String,
    idp_claim_name: String,
    claim_name: String,
    is_active: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ClaimMappingRow> for ClaimMapping {
    fn from(row: ClaimMappingRow) -> Self {
        Self {
            registration_id: RegistrationId::new(row.registration_id),
            claim_name: row.claim_name,
            idp_claim_name: row.idp_claim_name,
            scope: row.scope,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
impl ClaimMappingRepository for PgClaimMappingRepository {
    #[instrument(skip(self))]
    async fn find_by_registration_id(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<Vec<ClaimMapping>> {
        let sql = format!(
            "SELECT {} FROM claim_mapping \
             WHERE registration_id = $1 AND is_active = TRUE AND deleted_at IS NULL",
            MAPPING_COLUMNS
        );
        let rows = sqlx::query_as::<_, ClaimMappingRow>(&sql)
            .bind(registration_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(ClaimMapping::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_registration_id_and_scopes(
        &self,
        registration_id: &RegistrationId,
        scopes: &BTreeSet<String>,
    ) -> Result<Vec<ClaimMapping>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = scopes.iter().map(|s| s.to_lowercase()).collect();
        let sql = format!(
            "SELECT {} FROM claim_mapping \
             WHERE registration_id = $1 AND LOWER(scope) = ANY($2) \
             AND is_active = TRUE AND deleted_at IS NULL",
            MAPPING_COLUMNS
        );
        let rows = sqlx::query_as::<_, ClaimMappingRow>(&sql)
            .bind(registration_id.as_str())
            .bind(&lowered)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(ClaimMapping::from).collect())
    }

    #[instrument(skip(self, mappings), fields(count = mappings.len()))]
    async fn save_all(&self, mappings: &[ClaimMapping]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for mapping in mappings {
            sqlx::query(
                r#"
                INSERT INTO claim_mapping
                    (registration_id, scope, idp_claim_name, claim_name,
                     is_active, created_at, updated_at, deleted_at)
                VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()), $7, $8)
                ON CONFLICT (registration_id, scope, claim_name) DO UPDATE SET
                    idp_claim_name = EXCLUDED.idp_claim_name,
                    is_active = EXCLUDED.is_active,
                    updated_at = NOW(),
                    deleted_at = EXCLUDED.deleted_at
                "#,
            )
            .bind(mapping.registration_id.as_str())
            .bind(&mapping.scope)
            .bind(&mapping.idp_claim_name)
            .bind(&mapping.claim_name)
            .bind(mapping.is_active)
            .bind(mapping.created_at)
            .bind(mapping.updated_at)
            .bind(mapping.deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

/// PostgreSQL implementation of UserClaimRepository
pub struct PgUserClaimRepository {
    pool: PgPool,
}

impl PgUserClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserClaimRow {
    user_id: String,
    claim_name: String,
    value: String,
}

#[async_trait]
impl UserClaimRepository for PgUserClaimRepository {
    #[instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<UserClaim>> {
        let rows = sqlx::query_as::<_, UserClaimRow>(
            "SELECT user_id, claim_name, value FROM user_claim WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| UserClaim {
                user_id: row.user_id,
                claim_name: row.claim_name,
                value: row.value,
            })
            .collect())
    }

    #[instrument(skip(self, claims), fields(count = claims.len()))]
    async fn save_all(&self, claims: &[UserClaim]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for claim in claims {
            sqlx::query(
                r#"
                INSERT INTO user_claim (user_id, claim_name, value, updated_at)
                VALUES ($1, $2, $3, NOW())
                ON CONFLICT (user_id, claim_name) DO UPDATE SET
                    value = EXCLUDED.value,
                    updated_at = NOW()
                "#,
            )
            .bind(&claim.user_id)
            .bind(&claim.claim_name)
            .bind(&claim.value)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        debug!("Stored {} user claims", claims.len());
        Ok(())
    }
}
