/// Persisted reputation scores
///
/// One row per user per tenant, overwritten on every recomputation. The
/// `breakdown` column holds the full serialized
/// [`ReputationBreakdown`](crate::reputation::ReputationBreakdown).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReputationScore {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub kyc_score: f64,
    pub nps_score: f64,
    pub peer_rating_score: f64,
    pub revenue_score: f64,

    /// Final score on the 0..=900 scale
    pub total_score: f64,

    pub breakdown: JsonValue,
    pub computed_at: DateTime<Utc>,
}

/// Values written by [`ReputationScore::upsert`]
#[derive(Debug, Clone)]
pub struct ScoreUpsert {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub kyc_score: f64,
    pub nps_score: f64,
    pub peer_rating_score: f64,
    pub revenue_score: f64,
    pub total_score: f64,
    pub breakdown: JsonValue,
}

/// Result of an upsert: the stored row plus the total it replaced
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpsertedScore {
    pub total_score: f64,
    pub previous_score: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

impl ReputationScore {
    pub async fn find<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ReputationScore>(
            r#"
            SELECT tenant_id, user_id, kyc_score, nps_score, peer_rating_score,
                   revenue_score, total_score, breakdown, computed_at
            FROM reputation_scores
            WHERE tenant_id = $1 AND user_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Writes a freshly computed score
    ///
    /// The `previous` CTE reads the pre-statement snapshot, so
    /// `previous_score` is the total that was overwritten.
    pub async fn upsert<'e, E>(executor: E, data: ScoreUpsert) -> Result<UpsertedScore, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UpsertedScore>(
            r#"
            WITH previous AS (
                SELECT total_score FROM reputation_scores
                WHERE tenant_id = $1 AND user_id = $2
            )
            INSERT INTO reputation_scores (
                tenant_id, user_id, kyc_score, nps_score, peer_rating_score,
                revenue_score, total_score, breakdown, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (tenant_id, user_id) DO UPDATE SET
                kyc_score = EXCLUDED.kyc_score,
                nps_score = EXCLUDED.nps_score,
                peer_rating_score = EXCLUDED.peer_rating_score,
                revenue_score = EXCLUDED.revenue_score,
                total_score = EXCLUDED.total_score,
                breakdown = EXCLUDED.breakdown,
                computed_at = NOW()
            RETURNING total_score,
                      (SELECT total_score FROM previous) AS previous_score,
                      computed_at
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.user_id)
        .bind(data.kyc_score)
        .bind(data.nps_score)
        .bind(data.peer_rating_score)
        .bind(data.revenue_score)
        .bind(data.total_score)
        .bind(data.breakdown)
        .fetch_one(executor)
        .await
    }
}
