/// Reputation engine
///
/// A user's reputation is a 0..=900 score built from four sub-scores:
///
/// - **KYC**: profile completeness, record depth and skill verification,
///   split by tenant-configurable weights
/// - **NPS**: net promoter score over verified invites
/// - **Peer rating**: weighted question answers, discounted when the
///   verifier shares no skill with the rated user
/// - **Revenue**: client project revenue against a tenant target
///
/// [`formula`] holds the arithmetic, [`service`] loads inputs from
/// PostgreSQL and persists the result.
///
/// # Example
///
/// ```no_run
/// use repute_shared::reputation::ReputationService;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, tenant_id: Uuid, user_id: Uuid) {
/// let service = ReputationService::new(pool);
/// let score = service.update_reputation_score(tenant_id, user_id).await;
/// assert!((0.0..=900.0).contains(&score));
/// # }
/// ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod formula;
pub mod service;

pub use service::{ReputationService, ScoreUpdate};

/// Errors raised while computing or persisting a score
#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to serialize breakdown: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("User {user_id} is not a member of tenant {tenant_id}")]
    NotAMember { tenant_id: Uuid, user_id: Uuid },
}

/// Every intermediate value of one score computation
///
/// Stored as JSON next to the persisted score and returned by the
/// reputation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationBreakdown {
    pub basic_kyc: f64,
    pub advance_kyc: f64,
    pub skill_rating: f64,

    /// Sum of the three KYC parts, 0..=100
    pub kyc: f64,

    /// -100..=100
    pub nps_raw: f64,
    pub nps: f64,
    pub nps_responses: usize,

    /// Mean invite blend, 0..=5
    pub peer_rating_raw: f64,
    pub peer_rating: f64,
    pub rated_invites: usize,

    pub revenue: f64,
    pub total_revenue_cents: i64,

    /// 0..=900, rounded to two decimals
    pub final_score: f64,
}
