//! Education history entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::{date_range, not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Education {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "education_dates", skip_on_field_errors = false))]
pub struct EducationInput {
    #[validate(
        length(max = 255, message = "Must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub institution: String,
    #[validate(length(max = 255, message = "Must be at most 255 characters"))]
    pub degree: Option<String>,
    #[validate(length(max = 255, message = "Must be at most 255 characters"))]
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn education_dates(input: &EducationInput) -> Result<(), ValidationError> {
    date_range(input.start_date, input.end_date, "end_date")
}

const EDUCATION_COLUMNS: &str = "id, tenant_id, user_id, institution, degree, field_of_study, \
                                 start_date, end_date, created_at, updated_at";

impl Education {
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        data: EducationInput,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO educations (tenant_id, user_id, institution, degree, field_of_study, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {EDUCATION_COLUMNS}"
        );

        sqlx::query_as::<_, Education>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.institution)
            .bind(data.degree)
            .bind(data.field_of_study)
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
            "SELECT {EDUCATION_COLUMNS} FROM educations
             WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL
             ORDER BY start_date DESC NULLS LAST, created_at DESC"
        );

        sqlx::query_as::<_, Education>(&query)
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
            "SELECT {EDUCATION_COLUMNS} FROM educations
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Education>(&query)
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
        data: EducationInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE educations
             SET institution = $4, degree = $5, field_of_study = $6,
                 start_date = $7, end_date = $8, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL
             RETURNING {EDUCATION_COLUMNS}"
        );

        sqlx::query_as::<_, Education>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.institution)
            .bind(data.degree)
            .bind(data.field_of_study)
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
            "UPDATE educations SET deleted_at = NOW()
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
