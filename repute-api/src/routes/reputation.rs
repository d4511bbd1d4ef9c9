/// Reputation score endpoints
///
/// - `GET  /v1/reputation/me`
/// - `GET  /v1/reputation/users/:user_id`: members of the same tenant only
/// - `POST /v1/reputation/me/recompute`: 202, the worker does the work
///
/// Scores are read from what the worker last persisted. A user the worker
/// has not scored yet reads as 0 with `computed_at: null`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    jobs,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use repute_shared::{
    auth::{
        authorization::{require_role, require_same_tenant, AuthzError},
        middleware::AuthContext,
    },
    models::{
        membership::MembershipRole,
        reputation_job::{JobReason, JobState, ReputationJob},
        reputation_score::ReputationScore,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReputationResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub score: f64,
    pub kyc_score: f64,
    pub nps_score: f64,
    pub peer_rating_score: f64,
    pub revenue_score: f64,
    pub breakdown: Option<JsonValue>,
    pub computed_at: Option<DateTime<Utc>>,

    /// State of the most recent recompute job, if any
    pub recompute: Option<JobState>,
}

impl ReputationResponse {
    fn unscored(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self {
            user_id,
            tenant_id,
            score: 0.0,
            kyc_score: 0.0,
            nps_score: 0.0,
            peer_rating_score: 0.0,
            revenue_score: 0.0,
            breakdown: None,
            computed_at: None,
            recompute: None,
        }
    }
}

impl From<ReputationScore> for ReputationResponse {
    fn from(score: ReputationScore) -> Self {
        Self {
            user_id: score.user_id,
            tenant_id: score.tenant_id,
            score: score.total_score,
            kyc_score: score.kyc_score,
            nps_score: score.nps_score,
            peer_rating_score: score.peer_rating_score,
            revenue_score: score.revenue_score,
            breakdown: Some(score.breakdown),
            computed_at: Some(score.computed_at),
            recompute: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecomputeAccepted {
    pub user_id: Uuid,
    pub status: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_reputation))
        .route("/me/recompute", post(request_recompute))
        .route("/users/:user_id", get(user_reputation))
}

async fn load(state: &AppState, tenant_id: Uuid, user_id: Uuid) -> ApiResult<ReputationResponse> {
    let mut response = ReputationScore::find(&state.db, tenant_id, user_id)
        .await?
        .map(ReputationResponse::from)
        .unwrap_or_else(|| ReputationResponse::unscored(tenant_id, user_id));

    response.recompute = ReputationJob::latest_for_user(&state.db, tenant_id, user_id)
        .await?
        .map(|job| job.state);

    Ok(response)
}

pub async fn my_reputation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ReputationResponse>> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    Ok(Json(load(&state, auth.tenant_id, auth.user_id).await?))
}

pub async fn user_reputation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ReputationResponse>> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    require_same_tenant(&state.db, &auth, user_id)
        .await
        .map_err(|e| match e {
            AuthzError::NotMember(_) => ApiError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;
    Ok(Json(load(&state, auth.tenant_id, user_id).await?))
}

pub async fn request_recompute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<(StatusCode, Json<RecomputeAccepted>)> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::Requested);

    Ok((
        StatusCode::ACCEPTED,
        Json(RecomputeAccepted {
            user_id: auth.user_id,
            status: "queued",
        }),
    ))
}
