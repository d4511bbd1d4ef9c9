/// Per-tenant reputation weights
///
/// Admins tune how the KYC sub-score is split between profile completeness,
/// record depth and skill verification, plus the maxima and revenue target
/// the ratios are measured against. A tenant without a row uses
/// [`ReputationWeights::defaults_for`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validation::field_error;

/// Allowed drift of the three KYC weights from a sum of 1
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReputationWeights {
    pub tenant_id: Uuid,

    pub basic_kyc_weight: f64,
    pub advance_kyc_weight: f64,
    pub skill_rating_weight: f64,

    pub max_skills: i32,
    pub max_projects: i32,
    pub max_education: i32,
    pub max_certifications: i32,
    pub max_employments: i32,

    /// Revenue (minor units) at which the revenue sub-score saturates
    pub revenue_target_cents: i64,

    pub updated_by: Option<Uuid>,

    /// None until an admin saves the row
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `PUT /v1/admin/reputation-weights`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "weights_sum_to_one"))]
pub struct WeightsInput {
    #[validate(range(min = 0.0, max = 1.0, message = "Weight must be between 0 and 1"))]
    pub basic_kyc_weight: f64,
    #[validate(range(min = 0.0, max = 1.0, message = "Weight must be between 0 and 1"))]
    pub advance_kyc_weight: f64,
    #[validate(range(min = 0.0, max = 1.0, message = "Weight must be between 0 and 1"))]
    pub skill_rating_weight: f64,
    #[validate(range(min = 1, message = "Maximum must be at least 1"))]
    pub max_skills: i32,
    #[validate(range(min = 1, message = "Maximum must be at least 1"))]
    pub max_projects: i32,
    #[validate(range(min = 1, message = "Maximum must be at least 1"))]
    pub max_education: i32,
    #[validate(range(min = 1, message = "Maximum must be at least 1"))]
    pub max_certifications: i32,
    #[validate(range(min = 1, message = "Maximum must be at least 1"))]
    pub max_employments: i32,
    #[validate(range(min = 1, message = "Revenue target must be at least 1"))]
    pub revenue_target_cents: i64,
}

/// Runs only once every field passed its own range
fn weights_sum_to_one(input: &WeightsInput) -> Result<(), ValidationError> {
    let sum = input.basic_kyc_weight + input.advance_kyc_weight + input.skill_rating_weight;
    if !sum.is_finite() || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(field_error("weight_sum", "weights", "KYC weights must sum to 1"));
    }
    Ok(())
}

impl ReputationWeights {
    /// Weights used by a tenant that never saved its own
    pub fn defaults_for(tenant_id: Uuid) -> Self {
        ReputationWeights {
            tenant_id,
            basic_kyc_weight: 0.4,
            advance_kyc_weight: 0.3,
            skill_rating_weight: 0.3,
            max_skills: 10,
            max_projects: 10,
            max_education: 3,
            max_certifications: 5,
            max_employments: 5,
            revenue_target_cents: 10_000_000,
            updated_by: None,
            updated_at: None,
        }
    }

    /// Loads the tenant's weights, falling back to defaults
    pub async fn for_tenant<'e, E>(executor: E, tenant_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, ReputationWeights>(
            r#"
            SELECT tenant_id, basic_kyc_weight, advance_kyc_weight, skill_rating_weight,
                   max_skills, max_projects, max_education, max_certifications,
                   max_employments, revenue_target_cents, updated_by, updated_at
            FROM reputation_weights
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(row.unwrap_or_else(|| Self::defaults_for(tenant_id)))
    }

    /// Inserts or replaces the tenant's weights
    ///
    /// Callers validate `data` first; the table has no CHECK constraints
    /// for the sum.
    pub async fn upsert<'e, E>(
        executor: E,
        tenant_id: Uuid,
        data: &WeightsInput,
        updated_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ReputationWeights>(
            r#"
            INSERT INTO reputation_weights (
                tenant_id, basic_kyc_weight, advance_kyc_weight, skill_rating_weight,
                max_skills, max_projects, max_education, max_certifications,
                max_employments, revenue_target_cents, updated_by, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (tenant_id) DO UPDATE SET
                basic_kyc_weight = EXCLUDED.basic_kyc_weight,
                advance_kyc_weight = EXCLUDED.advance_kyc_weight,
                skill_rating_weight = EXCLUDED.skill_rating_weight,
                max_skills = EXCLUDED.max_skills,
                max_projects = EXCLUDED.max_projects,
                max_education = EXCLUDED.max_education,
                max_certifications = EXCLUDED.max_certifications,
                max_employments = EXCLUDED.max_employments,
                revenue_target_cents = EXCLUDED.revenue_target_cents,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING tenant_id, basic_kyc_weight, advance_kyc_weight, skill_rating_weight,
                      max_skills, max_projects, max_education, max_certifications,
                      max_employments, revenue_target_cents, updated_by, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(data.basic_kyc_weight)
        .bind(data.advance_kyc_weight)
        .bind(data.skill_rating_weight)
        .bind(data.max_skills)
        .bind(data.max_projects)
        .bind(data.max_education)
        .bind(data.max_certifications)
        .bind(data.max_employments)
        .bind(data.revenue_target_cents)
        .bind(updated_by)
        .fetch_one(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_input() -> WeightsInput {
        let defaults = ReputationWeights::defaults_for(Uuid::nil());
        WeightsInput {
            basic_kyc_weight: defaults.basic_kyc_weight,
            advance_kyc_weight: defaults.advance_kyc_weight,
            skill_rating_weight: defaults.skill_rating_weight,
            max_skills: defaults.max_skills,
            max_projects: defaults.max_projects,
            max_education: defaults.max_education,
            max_certifications: defaults.max_certifications,
            max_employments: defaults.max_employments,
            revenue_target_cents: defaults.revenue_target_cents,
        }
    }

    fn failing_fields(input: &WeightsInput) -> Vec<&'static str> {
        let errors = input.validate().unwrap_err();
        let mut fields: Vec<_> = errors.field_errors().into_keys().collect();
        fields.sort();
        fields
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(default_input().validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let input = WeightsInput {
            basic_kyc_weight: 0.5,
            ..default_input()
        };
        let errors = input.validate().unwrap_err();
        let sum_errors = errors.field_errors()["__all__"];
        assert_eq!(sum_errors.len(), 1);
        assert_eq!(sum_errors[0].params["field"], "weights");
    }

    #[test]
    fn test_sum_tolerates_float_noise() {
        let input = WeightsInput {
            basic_kyc_weight: 0.1,
            advance_kyc_weight: 0.2,
            skill_rating_weight: 0.7,
            ..default_input()
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_weight_reported_per_field() {
        let input = WeightsInput {
            basic_kyc_weight: 1.5,
            advance_kyc_weight: -0.5,
            skill_rating_weight: 0.0,
            ..default_input()
        };
        assert_eq!(
            failing_fields(&input),
            vec!["advance_kyc_weight", "basic_kyc_weight"]
        );
    }

    #[test]
    fn test_nan_weight_rejected() {
        let input = WeightsInput {
            basic_kyc_weight: f64::NAN,
            ..default_input()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_maxima_and_target_must_be_positive() {
        let input = WeightsInput {
            max_skills: 0,
            max_employments: -1,
            revenue_target_cents: 0,
            ..default_input()
        };
        assert_eq!(
            failing_fields(&input),
            vec!["max_employments", "max_skills", "revenue_target_cents"]
        );
    }
}
