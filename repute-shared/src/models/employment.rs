/// Employment history
///
/// Employment entries can be the subject of a verification invite, so
/// lookups used by invite creation go through [`Employment::find`], which
/// hides soft-deleted rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::{date_range, field_error, not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "employment_dates", skip_on_field_errors = false))]
#[validate(schema(function = "current_has_no_end", skip_on_field_errors = false))]
pub struct EmploymentInput {
    #[validate(
        length(max = 255, message = "Must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub company: String,
    #[validate(
        length(max = 255, message = "Must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[validate(length(max = 5000, message = "Must be at most 5000 characters"))]
    pub description: Option<String>,
}

fn employment_dates(input: &EmploymentInput) -> Result<(), ValidationError> {
    date_range(input.start_date, input.end_date, "end_date")
}

fn current_has_no_end(input: &EmploymentInput) -> Result<(), ValidationError> {
    if input.is_current && input.end_date.is_some() {
        return Err(field_error(
            "current_with_end",
            "end_date",
            "A current position has no end date",
        ));
    }
    Ok(())
}

const EMPLOYMENT_COLUMNS: &str = "id, tenant_id, user_id, company, title, start_date, end_date, \
                                  is_current, description, created_at, updated_at";

impl Employment {
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        data: EmploymentInput,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO employments (tenant_id, user_id, company, title, start_date, end_date, is_current, description)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {EMPLOYMENT_COLUMNS}"
        );

        sqlx::query_as::<_, Employment>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.company)
            .bind(data.title)
            .bind(data.start_date)
            .bind(data.end_date)
            .bind(data.is_current)
            .bind(data.description)
            .fetch_one(executor)
            .await
    }

    /// Current positions first, then most recent start date
    pub async fn list<'e, E>(executor: E, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {EMPLOYMENT_COLUMNS} FROM employments
             WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL
             ORDER BY is_current DESC, start_date DESC NULLS LAST, created_at DESC"
        );

        sqlx::query_as::<_, Employment>(&query)
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
            "SELECT {EMPLOYMENT_COLUMNS} FROM employments
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Employment>(&query)
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
        data: EmploymentInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE employments
             SET company = $4, title = $5, start_date = $6, end_date = $7,
                 is_current = $8, description = $9, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL
             RETURNING {EMPLOYMENT_COLUMNS}"
        );

        sqlx::query_as::<_, Employment>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.company)
            .bind(data.title)
            .bind(data.start_date)
            .bind(data.end_date)
            .bind(data.is_current)
            .bind(data.description)
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
            "UPDATE employments SET deleted_at = NOW()
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
