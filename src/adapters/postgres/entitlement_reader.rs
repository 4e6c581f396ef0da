//! PostgreSQL implementation of EntitlementReader.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::subscription::{Plan, PrincipalType};
use crate::ports::{Entitlement, EntitlementReader};

/// Reads standalone entitlement grants from the `entitlements` table.
pub struct PostgresEntitlementReader {
    pool: PgPool,
}

impl PostgresEntitlementReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    target_type: String,
    target_id: String,
    plan: String,
    active: bool,
}

impl TryFrom<EntitlementRow> for Entitlement {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let target_type = match row.target_type.as_str() {
            "user" => PrincipalType::User,
            "community" => PrincipalType::Community,
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid entitlement target_type: {}", other),
                ))
            }
        };
        let plan: Plan = row.plan.parse().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid entitlement plan: {}", e),
            )
        })?;

        Ok(Entitlement {
            target_type,
            target_id: row.target_id,
            plan,
            active: row.active,
        })
    }
}

#[async_trait]
impl EntitlementReader for PostgresEntitlementReader {
    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Entitlement>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(
            r#"
            SELECT target_type, target_id, plan, active
            FROM entitlements
            WHERE target_type = 'user' AND target_id = $1 AND active = true
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to query entitlements: {}", e),
            )
        })?;

        row.map(Entitlement::try_from).transpose()
    }
}
