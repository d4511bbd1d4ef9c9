/// Client projects
///
/// Revenue on live projects feeds the revenue sub-score. Amounts are kept
/// in minor units (`revenue_cents`) and are never negative.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE client_projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     client_name VARCHAR(255) NOT NULL,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     revenue_cents BIGINT CHECK (revenue_cents IS NULL OR revenue_cents >= 0),
///     currency VARCHAR(3),
///     start_date DATE,
///     end_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::{currency_code, date_range, not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClientProject {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub client_name: String,
    pub title: String,
    pub description: Option<String>,
    pub revenue_cents: Option<i64>,
    /// ISO 4217 code
    pub currency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "client_project_dates", skip_on_field_errors = false))]
pub struct ClientProjectInput {
    #[validate(
        length(max = 255, message = "Must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub client_name: String,
    #[validate(
        length(max = 255, message = "Must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(length(max = 5000, message = "Must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub revenue_cents: Option<i64>,
    #[validate(custom(function = "currency_code"))]
    pub currency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn client_project_dates(input: &ClientProjectInput) -> Result<(), ValidationError> {
    date_range(input.start_date, input.end_date, "end_date")
}

const CLIENT_PROJECT_COLUMNS: &str = "id, tenant_id, user_id, client_name, title, description, \
                                      revenue_cents, currency, start_date, end_date, \
                                      created_at, updated_at";

impl ClientProject {
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        data: ClientProjectInput,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO client_projects
                 (tenant_id, user_id, client_name, title, description, revenue_cents, currency, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {CLIENT_PROJECT_COLUMNS}"
        );

        sqlx::query_as::<_, ClientProject>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.client_name)
            .bind(data.title)
            .bind(data.description)
            .bind(data.revenue_cents)
            .bind(data.currency.map(|c| c.to_uppercase()))
            .bind(data.start_date)
            .bind(data.end_date)
            .fetch_one(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {CLIENT_PROJECT_COLUMNS} FROM client_projects
             WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL
             ORDER BY start_date DESC NULLS LAST, created_at DESC"
        );

        sqlx::query_as::<_, ClientProject>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {CLIENT_PROJECT_COLUMNS} FROM client_projects
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, ClientProject>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn update<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        data: ClientProjectInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE client_projects
             SET client_name = $4, title = $5, description = $6, revenue_cents = $7,
                 currency = $8, start_date = $9, end_date = $10, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL
             RETURNING {CLIENT_PROJECT_COLUMNS}"
        );

        sqlx::query_as::<_, ClientProject>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.client_name)
            .bind(data.title)
            .bind(data.description)
            .bind(data.revenue_cents)
            .bind(data.currency.map(|c| c.to_uppercase()))
            .bind(data.start_date)
            .bind(data.end_date)
            .fetch_optional(executor)
            .await
    }

    pub async fn soft_delete<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE client_projects SET deleted_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
