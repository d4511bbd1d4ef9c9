/// Peer-rating questions
///
/// Each tenant maintains a list of questions that verifiers answer when
/// confirming an invite. Deleting a question only deactivates it so past
/// answers keep their meaning.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE questions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     prompt VARCHAR(500) NOT NULL,
///     weight DOUBLE PRECISION NOT NULL CHECK (weight > 0),
///     max_rating SMALLINT NOT NULL DEFAULT 5 CHECK (max_rating BETWEEN 1 AND 10),
///     position INTEGER NOT NULL DEFAULT 0,
///     active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use super::validation::not_blank;

/// Upper bound accepted for `max_rating`
pub const MAX_RATING_CEILING: i16 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub prompt: String,

    /// Relative weight in the peer-rating blend, strictly positive
    pub weight: f64,

    /// Highest rating a verifier may give, 1..=10
    pub max_rating: i16,

    /// Display order, ascending
    pub position: i32,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of question create and replace requests
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(
        length(max = 500, message = "Must be at most 500 characters"),
        custom(function = "not_blank")
    )]
    pub prompt: String,
    #[validate(range(exclusive_min = 0.0, message = "Must be greater than 0"))]
    pub weight: f64,
    #[serde(default = "default_max_rating")]
    #[validate(range(min = 1, max = MAX_RATING_CEILING, message = "Must be between 1 and 10"))]
    pub max_rating: i16,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub position: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_max_rating() -> i16 {
    5
}

fn default_active() -> bool {
    true
}

const QUESTION_COLUMNS: &str =
    "id, tenant_id, prompt, weight, max_rating, position, active, created_at, updated_at";

impl Question {
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        data: QuestionInput,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO questions (tenant_id, prompt, weight, max_rating, position, active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {QUESTION_COLUMNS}"
        );

        sqlx::query_as::<_, Question>(&query)
            .bind(tenant_id)
            .bind(data.prompt.trim())
            .bind(data.weight)
            .bind(data.max_rating)
            .bind(data.position)
            .bind(data.active)
            .fetch_one(executor)
            .await
    }

    /// Lists every question of the tenant, active or not
    pub async fn list<'e, E>(executor: E, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions
             WHERE tenant_id = $1
             ORDER BY position ASC, created_at ASC"
        );

        sqlx::query_as::<_, Question>(&query)
            .bind(tenant_id)
            .fetch_all(executor)
            .await
    }

    /// Lists the questions a verifier must answer
    pub async fn list_active<'e, E>(executor: E, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions
             WHERE tenant_id = $1 AND active
             ORDER BY position ASC, created_at ASC"
        );

        sqlx::query_as::<_, Question>(&query)
            .bind(tenant_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find<'e, E>(executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND tenant_id = $2");

        sqlx::query_as::<_, Question>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn update<'e, E>(
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        data: QuestionInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE questions
             SET prompt = $3, weight = $4, max_rating = $5, position = $6, active = $7,
                 updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2
             RETURNING {QUESTION_COLUMNS}"
        );

        sqlx::query_as::<_, Question>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(data.prompt.trim())
            .bind(data.weight)
            .bind(data.max_rating)
            .bind(data.position)
            .bind(data.active)
            .fetch_optional(executor)
            .await
    }

    /// Marks a question inactive; false when it does not exist
    pub async fn deactivate<'e, E>(executor: E, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE questions SET active = FALSE, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_input_defaults() {
        let input: QuestionInput =
            serde_json::from_str(r#"{"prompt": "Communication?", "weight": 2.0}"#).unwrap();
        assert_eq!(input.max_rating, 5);
        assert_eq!(input.position, 0);
        assert!(input.active);
    }
}
