//! Professional certifications.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::{date_range, not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Certification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub issuer: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub credential_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "certification_dates", skip_on_field_errors = false))]
pub struct CertificationInput {
    #[validate(
        length(max = 255, message = "Must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(length(max = 255, message = "Must be at most 255 characters"))]
    pub issuer: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    #[validate(
        length(max = 512, message = "Must be at most 512 characters"),
        url(message = "Must be an absolute URL")
    )]
    pub credential_url: Option<String>,
}

fn certification_dates(input: &CertificationInput) -> Result<(), ValidationError> {
    date_range(input.issued_on, input.expires_on, "expires_on")
}

const CERTIFICATION_COLUMNS: &str = "id, tenant_id, user_id, name, issuer, issued_on, expires_on, \
                                     credential_url, created_at, updated_at";

impl Certification {
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        data: CertificationInput,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO certifications (tenant_id, user_id, name, issuer, issued_on, expires_on, credential_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {CERTIFICATION_COLUMNS}"
        );

        sqlx::query_as::<_, Certification>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.name)
            .bind(data.issuer)
            .bind(data.issued_on)
            .bind(data.expires_on)
            .bind(data.credential_url)
            .fetch_one(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {CERTIFICATION_COLUMNS} FROM certifications
             WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL
             ORDER BY issued_on DESC NULLS LAST, created_at DESC"
        );

        sqlx::query_as::<_, Certification>(&query)
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
            "SELECT {CERTIFICATION_COLUMNS} FROM certifications
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Certification>(&query)
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
        data: CertificationInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE certifications
             SET name = $4, issuer = $5, issued_on = $6, expires_on = $7,
                 credential_url = $8, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL
             RETURNING {CERTIFICATION_COLUMNS}"
        );

        sqlx::query_as::<_, Certification>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.name)
            .bind(data.issuer)
            .bind(data.issued_on)
            .bind(data.expires_on)
            .bind(data.credential_url)
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
            "UPDATE certifications SET deleted_at = NOW()
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
