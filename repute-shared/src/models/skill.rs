/// Member skills
///
/// Skills are the subjects of skill verification invites and carry the tag
/// used to decide whether a verifier shares expertise with the rated user.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE skills (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     tag VARCHAR(100) NOT NULL,
///     years_of_experience SMALLINT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
///
/// CREATE UNIQUE INDEX uq_skills_user_tag ON skills(tenant_id, user_id, tag)
///     WHERE deleted_at IS NULL;
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use super::validation::not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub name: String,

    /// Normalized form of `name`, see [`normalize_tag`]
    pub tag: String,

    pub years_of_experience: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of skill create and replace requests
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SkillInput {
    #[validate(
        length(max = 100, message = "Must be at most 100 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(range(min = 0, max = 80, message = "Must be between 0 and 80"))]
    pub years_of_experience: Option<i16>,
}

/// Derives the comparison tag for a skill name
///
/// Lower-cases, trims and joins inner whitespace runs with `-`, so
/// `"  Rust   Async "` becomes `"rust-async"`.
pub fn normalize_tag(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

const SKILL_COLUMNS: &str =
    "id, tenant_id, user_id, name, tag, years_of_experience, created_at, updated_at";

impl Skill {
    /// # Errors
    ///
    /// Fails with a unique violation when the user already has a live skill
    /// with the same tag.
    pub async fn create<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        data: SkillInput,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tag = normalize_tag(&data.name);
        let query = format!(
            "INSERT INTO skills (tenant_id, user_id, name, tag, years_of_experience)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SKILL_COLUMNS}"
        );

        sqlx::query_as::<_, Skill>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.name.trim())
            .bind(tag)
            .bind(data.years_of_experience)
            .fetch_one(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {SKILL_COLUMNS} FROM skills
             WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL
             ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, Skill>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Finds a live skill owned by the user
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
            "SELECT {SKILL_COLUMNS} FROM skills
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        );

        sqlx::query_as::<_, Skill>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Replaces name, tag and experience; None when not found
    pub async fn update<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        data: SkillInput,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tag = normalize_tag(&data.name);
        let query = format!(
            "UPDATE skills
             SET name = $4, tag = $5, years_of_experience = $6, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL
             RETURNING {SKILL_COLUMNS}"
        );

        sqlx::query_as::<_, Skill>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .bind(data.name.trim())
            .bind(tag)
            .bind(data.years_of_experience)
            .fetch_optional(executor)
            .await
    }

    /// Soft-deletes a skill; false when it was not found
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
            r#"
            UPDATE skills SET deleted_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("Rust"), "rust");
        assert_eq!(normalize_tag("  Rust   Async "), "rust-async");
        assert_eq!(normalize_tag("Machine\tLearning"), "machine-learning");
        assert_eq!(normalize_tag("C++"), "c++");
    }

    #[test]
    fn test_normalize_tag_blank() {
        assert_eq!(normalize_tag("   "), "");
    }
}
