/// Loading reputation inputs and persisting scores

use super::formula::{
    compute_breakdown, RatedInvite, RecordCounts, ReputationInputs, SkillInviteStats,
    WeightedAnswer,
};
use super::{ReputationBreakdown, ReputationError};
use crate::models::membership::Membership;
use crate::models::profile::Profile;
use crate::models::reputation_score::{ReputationScore, ScoreUpsert};
use crate::models::reputation_weights::ReputationWeights;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Restricts an invite alias `i` to subjects that are not soft-deleted
const LIVE_SUBJECT: &str = r#"
    (
        (i.subject_kind = 'skill' AND EXISTS (
            SELECT 1 FROM skills s WHERE s.id = i.subject_id AND s.deleted_at IS NULL))
        OR (i.subject_kind = 'client_project' AND EXISTS (
            SELECT 1 FROM client_projects p WHERE p.id = i.subject_id AND p.deleted_at IS NULL))
        OR (i.subject_kind = 'employment' AND EXISTS (
            SELECT 1 FROM employments e WHERE e.id = i.subject_id AND e.deleted_at IS NULL))
    )
"#;

/// Outcome of a persisted recomputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub score: f64,
    pub previous_score: Option<f64>,
    pub computed_at: DateTime<Utc>,
    pub breakdown: ReputationBreakdown,
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    skills: i64,
    projects: i64,
    education: i64,
    certifications: i64,
    employments: i64,
}

#[derive(sqlx::FromRow)]
struct SkillInviteRow {
    sent: i64,
    verified: i64,
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    invite_id: Uuid,
    verifier_user_id: Option<Uuid>,
    shares_skill_tag: bool,
    weight: f64,
    max_rating: i16,
    rating: i16,
}

/// Computes and stores reputation scores
#[derive(Clone)]
pub struct ReputationService {
    db: PgPool,
}

impl ReputationService {
    pub fn new(db: PgPool) -> Self {
        ReputationService { db }
    }

    /// Computes a user's score without persisting it
    ///
    /// # Errors
    ///
    /// Returns [`ReputationError::NotAMember`] when the user has no
    /// membership in the tenant, or a database error.
    pub async fn compute(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<ReputationBreakdown, ReputationError> {
        if Membership::find(&self.db, tenant_id, user_id).await?.is_none() {
            return Err(ReputationError::NotAMember { tenant_id, user_id });
        }

        let weights = ReputationWeights::for_tenant(&self.db, tenant_id).await?;
        let inputs = self.load_inputs(tenant_id, user_id).await?;

        debug!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            skills = inputs.skill_invites.len(),
            nps_ratings = inputs.nps_ratings.len(),
            rated_invites = inputs.rated_invites.len(),
            "Loaded reputation inputs"
        );

        Ok(compute_breakdown(&inputs, &weights))
    }

    /// Computes, persists and reports a user's score
    pub async fn recompute(&self, tenant_id: Uuid, user_id: Uuid) -> Result<ScoreUpdate, ReputationError> {
        let breakdown = self.compute(tenant_id, user_id).await?;

        let stored = ReputationScore::upsert(
            &self.db,
            ScoreUpsert {
                tenant_id,
                user_id,
                kyc_score: breakdown.kyc,
                nps_score: breakdown.nps,
                peer_rating_score: breakdown.peer_rating,
                revenue_score: breakdown.revenue,
                total_score: breakdown.final_score,
                breakdown: serde_json::to_value(&breakdown)?,
            },
        )
        .await?;

        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            score = stored.total_score,
            previous_score = ?stored.previous_score,
            "Reputation score updated"
        );

        Ok(ScoreUpdate {
            tenant_id,
            user_id,
            score: stored.total_score,
            previous_score: stored.previous_score,
            computed_at: stored.computed_at,
            breakdown,
        })
    }

    /// Recomputes and persists a score, never failing
    ///
    /// Any error is logged and reported as a score of 0.
    pub async fn update_reputation_score(&self, tenant_id: Uuid, user_id: Uuid) -> f64 {
        match self.recompute(tenant_id, user_id).await {
            Ok(update) => update.score,
            Err(e) => {
                error!(
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to update reputation score"
                );
                0.0
            }
        }
    }

    async fn load_inputs(&self, tenant_id: Uuid, user_id: Uuid) -> Result<ReputationInputs, sqlx::Error> {
        let populated_profile_fields = Profile::find(&self.db, tenant_id, user_id)
            .await?
            .map(|profile| profile.populated_fields())
            .unwrap_or(0);

        Ok(ReputationInputs {
            populated_profile_fields,
            counts: self.load_counts(tenant_id, user_id).await?,
            skill_invites: self.load_skill_invites(tenant_id, user_id).await?,
            nps_ratings: self.load_nps_ratings(tenant_id, user_id).await?,
            rated_invites: self.load_rated_invites(tenant_id, user_id).await?,
            total_revenue_cents: self.load_revenue(tenant_id, user_id).await?,
        })
    }

    async fn load_counts(&self, tenant_id: Uuid, user_id: Uuid) -> Result<RecordCounts, sqlx::Error> {
        let row = sqlx::query_as::<_, CountsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM skills
                 WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL) AS skills,
                (SELECT COUNT(*) FROM client_projects
                 WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL) AS projects,
                (SELECT COUNT(*) FROM educations
                 WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL) AS education,
                (SELECT COUNT(*) FROM certifications
                 WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL) AS certifications,
                (SELECT COUNT(*) FROM employments
                 WHERE tenant_id = $1 AND user_id = $2 AND deleted_at IS NULL) AS employments
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(RecordCounts {
            skills: row.skills,
            projects: row.projects,
            education: row.education,
            certifications: row.certifications,
            employments: row.employments,
        })
    }

    async fn load_skill_invites(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<SkillInviteStats>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SkillInviteRow>(
            r#"
            SELECT COUNT(i.id) AS sent,
                   COUNT(i.id) FILTER (WHERE i.status = 'verified') AS verified
            FROM skills s
            LEFT JOIN verification_invites i
                ON i.subject_kind = 'skill'
               AND i.subject_id = s.id
               AND i.tenant_id = s.tenant_id
            WHERE s.tenant_id = $1 AND s.user_id = $2 AND s.deleted_at IS NULL
            GROUP BY s.id
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SkillInviteStats {
                sent: row.sent,
                verified: row.verified,
            })
            .collect())
    }

    async fn load_nps_ratings(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<i16>, sqlx::Error> {
        let query = format!(
            "SELECT i.nps_rating FROM verification_invites i
             WHERE i.tenant_id = $1 AND i.user_id = $2
               AND i.status = 'verified' AND i.nps_rating IS NOT NULL
               AND {LIVE_SUBJECT}"
        );

        sqlx::query_scalar::<_, i16>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_all(&self.db)
            .await
    }

    async fn load_rated_invites(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<RatedInvite>, sqlx::Error> {
        let query = format!(
            "SELECT i.id AS invite_id,
                    i.verifier_user_id,
                    EXISTS (
                        SELECT 1 FROM skills vs
                        JOIN skills us ON us.tag = vs.tag
                        WHERE vs.user_id = i.verifier_user_id AND vs.deleted_at IS NULL
                          AND us.tenant_id = i.tenant_id AND us.user_id = i.user_id
                          AND us.deleted_at IS NULL
                    ) AS shares_skill_tag,
                    q.weight,
                    q.max_rating,
                    a.rating
             FROM verification_invites i
             JOIN invite_answers a ON a.invite_id = i.id
             JOIN questions q ON q.id = a.question_id
             WHERE i.tenant_id = $1 AND i.user_id = $2 AND i.status = 'verified'
               AND {LIVE_SUBJECT}
             ORDER BY i.id"
        );

        let rows = sqlx::query_as::<_, AnswerRow>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(group_answers(rows))
    }

    async fn load_revenue(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(revenue_cents), 0)::BIGINT
            FROM client_projects
            WHERE tenant_id = $1 AND user_id = $2
              AND deleted_at IS NULL AND revenue_cents IS NOT NULL
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
    }
}

/// Folds answer rows ordered by invite into one [`RatedInvite`] per invite
fn group_answers(rows: Vec<AnswerRow>) -> Vec<RatedInvite> {
    let mut invites: Vec<RatedInvite> = Vec::new();
    let mut current: Option<Uuid> = None;

    for row in rows {
        if current != Some(row.invite_id) {
            current = Some(row.invite_id);
            invites.push(RatedInvite {
                answers: Vec::new(),
                verifier_registered: row.verifier_user_id.is_some(),
                shares_skill_tag: row.shares_skill_tag,
            });
        }

        if let Some(invite) = invites.last_mut() {
            invite.answers.push(WeightedAnswer {
                weight: row.weight,
                rating: row.rating,
                max_rating: row.max_rating,
            });
        }
    }

    invites
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(invite_id: Uuid, registered: bool, rating: i16) -> AnswerRow {
        AnswerRow {
            invite_id,
            verifier_user_id: registered.then(Uuid::new_v4),
            shares_skill_tag: registered,
            weight: 1.0,
            max_rating: 5,
            rating,
        }
    }

    #[test]
    fn test_group_answers_by_invite() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let grouped = group_answers(vec![
            row(first, true, 5),
            row(first, true, 4),
            row(second, false, 2),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].answers.len(), 2);
        assert!(grouped[0].verifier_registered);
        assert!(grouped[0].shares_skill_tag);
        assert_eq!(grouped[1].answers.len(), 1);
        assert!(!grouped[1].verifier_registered);
    }

    #[test]
    fn test_group_answers_empty() {
        assert!(group_answers(Vec::new()).is_empty());
    }
}
