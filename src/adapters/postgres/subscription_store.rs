//! PostgreSQL implementation of SubscriptionStore.
//!
//! Users and communities live in separate tables that share the same
//! `subscription_*` column set. Patches are written with a dynamic
//! `UPDATE ... SET` that touches only the fields the patch carries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::foundation::{CommunityId, DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::{
    Plan, PrincipalRef, Subscription, SubscriptionPatch, SubscriptionSource,
};
use crate::ports::{LocatedSubscription, SubscriptionStore};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id,
    subscription_active,
    subscription_plan,
    subscription_is_annual,
    subscription_duration_months,
    subscription_source,
    subscription_external_subscription_id,
    subscription_external_customer_id,
    subscription_purchase_date,
    subscription_expiration_date,
    subscription_cancel_at,
    subscription_updated_at
"#;

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_in(&self, table: Table, id: &str) -> Result<Option<SubscriptionRow>, DomainError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            SUBSCRIPTION_COLUMNS,
            table.name()
        );
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error(table, e))
    }

    async fn find_by_external_in(
        &self,
        table: Table,
        external_subscription_id: &str,
    ) -> Result<Option<SubscriptionRow>, DomainError> {
        // Most recently updated wins if an id was ever reused.
        let sql = format!(
            "SELECT {} FROM {} WHERE subscription_external_subscription_id = $1 \
             ORDER BY subscription_updated_at DESC NULLS LAST LIMIT 1",
            SUBSCRIPTION_COLUMNS,
            table.name()
        );
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(external_subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error(table, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Users,
    Communities,
}

impl Table {
    fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Communities => "communities",
        }
    }

    fn of(principal: &PrincipalRef) -> Self {
        match principal {
            PrincipalRef::User(_) => Table::Users,
            PrincipalRef::Community(_) => Table::Communities,
        }
    }
}

fn query_error(table: Table, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to query {}: {}", table.name(), e),
    )
}

/// Database row representation of a subscription sub-record.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    subscription_active: bool,
    subscription_plan: String,
    subscription_is_annual: bool,
    subscription_duration_months: Option<i32>,
    subscription_source: String,
    subscription_external_subscription_id: Option<String>,
    subscription_external_customer_id: Option<String>,
    subscription_purchase_date: Option<DateTime<Utc>>,
    subscription_expiration_date: Option<DateTime<Utc>>,
    subscription_cancel_at: Option<DateTime<Utc>>,
    subscription_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let plan: Plan = row.subscription_plan.parse().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid plan value for {}: {}", row.id, e),
            )
        })?;

        let duration_months = row
            .subscription_duration_months
            .map(|months| {
                u32::try_from(months).map_err(|_| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Negative duration_months for {}: {}", row.id, months),
                    )
                })
            })
            .transpose()?;

        Ok(Subscription {
            active: row.subscription_active,
            plan,
            is_annual: row.subscription_is_annual,
            duration_months,
            source: SubscriptionSource::parse(&row.subscription_source),
            external_subscription_id: row.subscription_external_subscription_id,
            external_customer_id: row.subscription_external_customer_id,
            purchase_date: row.subscription_purchase_date.map(Timestamp::from_datetime),
            expiration_date: row.subscription_expiration_date.map(Timestamp::from_datetime),
            cancel_at: row.subscription_cancel_at.map(Timestamp::from_datetime),
            updated_at: row.subscription_updated_at.map(Timestamp::from_datetime),
        })
    }
}

fn located(table: Table, row: SubscriptionRow) -> Result<LocatedSubscription, DomainError> {
    let principal = match table {
        Table::Users => PrincipalRef::User(UserId::new(row.id.clone())?),
        Table::Communities => PrincipalRef::Community(CommunityId::new(row.id.clone())?),
    };
    Ok(LocatedSubscription {
        principal,
        subscription: Subscription::try_from(row)?,
    })
}

fn months_column(months: Option<u32>) -> Result<Option<i32>, DomainError> {
    months
        .map(|m| {
            i32::try_from(m).map_err(|_| {
                DomainError::validation("duration_months", format!("{} is out of range", m))
            })
        })
        .transpose()
}

/// Builds the `UPDATE` for a patch. Only fields present in the patch are set.
fn update_query<'a>(
    table: Table,
    principal_id: &'a str,
    patch: &'a SubscriptionPatch,
) -> Result<QueryBuilder<'a, Postgres>, DomainError> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", table.name()));
    let mut set = qb.separated(", ");

    if let Some(active) = patch.active {
        set.push("subscription_active = ").push_bind_unseparated(active);
    }
    if let Some(plan) = patch.plan {
        set.push("subscription_plan = ")
            .push_bind_unseparated(plan.as_str());
    }
    if let Some(is_annual) = patch.is_annual {
        set.push("subscription_is_annual = ")
            .push_bind_unseparated(is_annual);
    }
    if let Some(months) = patch.duration_months {
        set.push("subscription_duration_months = ")
            .push_bind_unseparated(months_column(months)?);
    }
    if let Some(source) = patch.source {
        set.push("subscription_source = ")
            .push_bind_unseparated(source.as_str());
    }
    if let Some(id) = &patch.external_subscription_id {
        set.push("subscription_external_subscription_id = ")
            .push_bind_unseparated(id.as_deref());
    }
    if let Some(id) = &patch.external_customer_id {
        set.push("subscription_external_customer_id = ")
            .push_bind_unseparated(id.as_str());
    }
    if let Some(at) = patch.purchase_date {
        set.push("subscription_purchase_date = ")
            .push_bind_unseparated(*at.as_datetime());
    }
    if let Some(at) = patch.expiration_date {
        set.push("subscription_expiration_date = ")
            .push_bind_unseparated(at.map(|t| *t.as_datetime()));
    }
    if let Some(at) = patch.cancel_at {
        set.push("subscription_cancel_at = ")
            .push_bind_unseparated(at.map(|t| *t.as_datetime()));
    }
    if table == Table::Communities {
        if let Some(user) = &patch.created_by {
            set.push("subscription_created_by = ")
                .push_bind_unseparated(user.as_str());
        }
    }
    set.push("subscription_updated_at = ")
        .push_bind_unseparated(*patch.updated_at.as_datetime());
    set.push("updated_at = now()");

    qb.push(" WHERE id = ").push_bind(principal_id);
    Ok(qb)
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn find_by_principal(
        &self,
        principal: &PrincipalRef,
    ) -> Result<Option<Subscription>, DomainError> {
        self.find_in(Table::of(principal), principal.id())
            .await?
            .map(Subscription::try_from)
            .transpose()
    }

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<LocatedSubscription>, DomainError> {
        for table in [Table::Users, Table::Communities] {
            if let Some(row) = self
                .find_by_external_in(table, external_subscription_id)
                .await?
            {
                return located(table, row).map(Some);
            }
        }
        Ok(None)
    }

    async fn apply_patch(
        &self,
        principal: &PrincipalRef,
        patch: &SubscriptionPatch,
    ) -> Result<bool, DomainError> {
        let table = Table::of(principal);
        let mut query = update_query(table, principal.id(), patch)?;

        let result = query.build().execute(&self.pool).await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update subscription for {}: {}", principal, e),
            )
        })?;

        Ok(result.rows_affected() > 0)
    }
}
