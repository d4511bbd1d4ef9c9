/// Verification invites and the answers verifiers submit
///
/// A user invites someone by email to vouch for one of their skills,
/// client projects or employments. The verifier follows a link carrying a
/// one-time token, answers the tenant's active questions and gives an NPS
/// rating. The invite moves out of `pending` exactly once.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE invite_subject AS ENUM ('skill', 'client_project', 'employment');
/// CREATE TYPE invite_status AS ENUM ('pending', 'verified', 'declined', 'expired');
///
/// CREATE TABLE verification_invites (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     subject_kind invite_subject NOT NULL,
///     subject_id UUID NOT NULL,
///     verifier_email CITEXT NOT NULL,
///     verifier_user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     status invite_status NOT NULL DEFAULT 'pending',
///     nps_rating SMALLINT CHECK (nps_rating IS NULL OR nps_rating BETWEEN 0 AND 10),
///     token_hash VARCHAR(64) NOT NULL UNIQUE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     verified_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE invite_answers (
///     invite_id UUID NOT NULL REFERENCES verification_invites(id) ON DELETE CASCADE,
///     question_id UUID NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
///     rating SMALLINT NOT NULL CHECK (rating >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (invite_id, question_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

/// What an invite asks the verifier to vouch for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invite_subject", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Skill,
    ClientProject,
    Employment,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Skill => "skill",
            SubjectKind::ClientProject => "client_project",
            SubjectKind::Employment => "employment",
        }
    }
}

/// Invite lifecycle
///
/// `Pending` is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invite_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Verified,
    Declined,
    Expired,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Verified => "verified",
            InviteStatus::Declined => "declined",
            InviteStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InviteStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationInvite {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// The user being vouched for
    pub user_id: Uuid,

    pub subject_kind: SubjectKind,
    pub subject_id: Uuid,
    pub verifier_email: String,

    /// Set on completion when the verifier email belongs to a registered user
    pub verifier_user_id: Option<Uuid>,

    pub status: InviteStatus,
    pub nps_rating: Option<i16>,

    #[serde(skip_serializing)]
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationInvite {
    /// True when still pending but past its expiry
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Pending && self.expires_at <= now
    }
}

/// Input for creating an invite
#[derive(Debug, Clone)]
pub struct CreateInvite {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub subject_kind: SubjectKind,
    pub subject_id: Uuid,
    pub verifier_email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// A single answer to a question
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Uuid,
    pub rating: i16,
}

/// Short description of an invite subject shown to the verifier
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubjectSummary {
    pub title: String,
    pub detail: Option<String>,
}

const INVITE_COLUMNS: &str = "id, tenant_id, user_id, subject_kind, subject_id, verifier_email, \
                              verifier_user_id, status, nps_rating, token_hash, expires_at, \
                              verified_at, created_at";

impl VerificationInvite {
    /// # Errors
    ///
    /// Fails with a unique violation in the astronomically unlikely case of
    /// a token hash collision.
    pub async fn create<'e, E>(executor: E, data: CreateInvite) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO verification_invites
                 (tenant_id, user_id, subject_kind, subject_id, verifier_email, token_hash, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {INVITE_COLUMNS}"
        );

        sqlx::query_as::<_, VerificationInvite>(&query)
            .bind(data.tenant_id)
            .bind(data.user_id)
            .bind(data.subject_kind)
            .bind(data.subject_id)
            .bind(data.verifier_email)
            .bind(data.token_hash)
            .bind(data.expires_at)
            .fetch_one(executor)
            .await
    }

    /// Lists the invites a user has sent, newest first
    pub async fn list<'e, E>(executor: E, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {INVITE_COLUMNS} FROM verification_invites
             WHERE tenant_id = $1 AND user_id = $2
             ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, VerificationInvite>(&query)
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
            "SELECT {INVITE_COLUMNS} FROM verification_invites
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3"
        );

        sqlx::query_as::<_, VerificationInvite>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_token_hash<'e, E>(
        executor: E,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {INVITE_COLUMNS} FROM verification_invites WHERE token_hash = $1");

        sqlx::query_as::<_, VerificationInvite>(&query)
            .bind(token_hash)
            .fetch_optional(executor)
            .await
    }

    /// Locks a pending invite for completion
    ///
    /// Returns None when the invite is gone or no longer pending, which is
    /// how concurrent submissions for the same token lose the race.
    pub async fn lock_pending(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {INVITE_COLUMNS} FROM verification_invites
             WHERE id = $1 AND status = 'pending'
             FOR UPDATE"
        );

        sqlx::query_as::<_, VerificationInvite>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Moves a pending invite past its expiry to `expired`
    pub async fn mark_expired<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE verification_invites SET status = 'expired'
             WHERE id = $1 AND status = 'pending' AND expires_at <= NOW()",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records the verifier's outcome on a locked pending invite
    pub async fn complete(
        conn: &mut PgConnection,
        id: Uuid,
        outcome: InviteStatus,
        nps_rating: Option<i16>,
        verifier_user_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE verification_invites
             SET status = $2, nps_rating = $3, verifier_user_id = $4, verified_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING {INVITE_COLUMNS}"
        );

        sqlx::query_as::<_, VerificationInvite>(&query)
            .bind(id)
            .bind(outcome)
            .bind(nps_rating)
            .bind(verifier_user_id)
            .fetch_optional(conn)
            .await
    }

    /// Inserts the verifier's answers in one statement
    pub async fn insert_answers(
        conn: &mut PgConnection,
        invite_id: Uuid,
        answers: &[Answer],
    ) -> Result<(), sqlx::Error> {
        if answers.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO invite_answers (invite_id, question_id, rating) ",
        );
        qb.push_values(answers, |mut row, answer| {
            row.push_bind(invite_id)
                .push_bind(answer.question_id)
                .push_bind(answer.rating);
        });

        qb.build().execute(conn).await?;
        Ok(())
    }
}

/// Loads a summary of a live subject owned by the user
///
/// Returns None when the subject does not exist, belongs to someone else
/// or was soft-deleted.
pub async fn find_subject<'e, E>(
    executor: E,
    kind: SubjectKind,
    tenant_id: Uuid,
    user_id: Uuid,
    subject_id: Uuid,
) -> Result<Option<SubjectSummary>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = match kind {
        SubjectKind::Skill => {
            "SELECT name AS title, NULL::TEXT AS detail FROM skills
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        }
        SubjectKind::ClientProject => {
            "SELECT title, client_name AS detail FROM client_projects
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        }
        SubjectKind::Employment => {
            "SELECT title, company AS detail FROM employments
             WHERE id = $1 AND tenant_id = $2 AND user_id = $3 AND deleted_at IS NULL"
        }
    };

    sqlx::query_as::<_, SubjectSummary>(query)
        .bind(subject_id)
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}
