/// Reputation recomputation jobs
///
/// Anything that changes a user's reputation inputs enqueues a job; the
/// worker drains the table. At most one `pending` job exists per user per
/// tenant, so a burst of edits collapses into a single recomputation.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE job_state AS ENUM ('pending', 'running', 'succeeded', 'failed');
///
/// CREATE TABLE reputation_jobs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     reason VARCHAR(64) NOT NULL,
///     state job_state NOT NULL DEFAULT 'pending',
///     attempts INTEGER NOT NULL DEFAULT 0,
///     last_error TEXT,
///     run_after TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     started_at TIMESTAMPTZ,
///     ended_at TIMESTAMPTZ
/// );
///
/// CREATE UNIQUE INDEX uq_reputation_jobs_pending ON reputation_jobs(tenant_id, user_id)
///     WHERE state = 'pending';
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

/// Why a recomputation was requested, stored for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobReason {
    ProfileUpdated,
    RecordChanged,
    InviteSent,
    InviteCompleted,
    QuestionsChanged,
    WeightsUpdated,
    MemberAdded,
    Requested,
}

impl JobReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobReason::ProfileUpdated => "profile_updated",
            JobReason::RecordChanged => "record_changed",
            JobReason::InviteSent => "invite_sent",
            JobReason::InviteCompleted => "invite_completed",
            JobReason::QuestionsChanged => "questions_changed",
            JobReason::WeightsUpdated => "weights_updated",
            JobReason::MemberAdded => "member_added",
            JobReason::Requested => "requested",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReputationJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub state: JobState,

    /// Incremented each time the job is claimed
    pub attempts: i32,

    pub last_error: Option<String>,

    /// Not claimable before this instant
    pub run_after: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

pub const JOB_COLUMNS: &str = "id, tenant_id, user_id, reason, state, attempts, last_error, \
                               run_after, created_at, started_at, ended_at";

impl ReputationJob {
    /// Enqueues a recomputation for one user
    ///
    /// Returns false when a pending job already existed and absorbed this one.
    pub async fn enqueue<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        reason: JobReason,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO reputation_jobs (tenant_id, user_id, reason)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, user_id) WHERE state = 'pending' DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(reason.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Enqueues a recomputation for every member of a tenant
    ///
    /// Returns the number of jobs actually inserted.
    pub async fn enqueue_tenant<'e, E>(
        executor: E,
        tenant_id: Uuid,
        reason: JobReason,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO reputation_jobs (tenant_id, user_id, reason)
            SELECT tenant_id, user_id, $2 FROM memberships WHERE tenant_id = $1
            ON CONFLICT (tenant_id, user_id) WHERE state = 'pending' DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(reason.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Latest job for a user, used by status endpoints and tests
    pub async fn latest_for_user<'e, E>(
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {JOB_COLUMNS} FROM reputation_jobs
             WHERE tenant_id = $1 AND user_id = $2
             ORDER BY created_at DESC
             LIMIT 1"
        );

        sqlx::query_as::<_, ReputationJob>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_as_str() {
        assert_eq!(JobState::Pending.as_str(), "pending");
        assert_eq!(JobState::Running.as_str(), "running");
        assert_eq!(JobState::Succeeded.as_str(), "succeeded");
        assert_eq!(JobState::Failed.as_str(), "failed");
    }

    #[test]
    fn test_job_reason_matches_serde() {
        for reason in [
            JobReason::ProfileUpdated,
            JobReason::RecordChanged,
            JobReason::InviteSent,
            JobReason::InviteCompleted,
            JobReason::QuestionsChanged,
            JobReason::WeightsUpdated,
            JobReason::MemberAdded,
            JobReason::Requested,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }
}
