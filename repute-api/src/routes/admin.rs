/// Tenant administration
///
/// - `GET/POST        /v1/admin/questions`
/// - `GET/PUT/DELETE  /v1/admin/questions/:id`: DELETE deactivates
/// - `GET/PUT         /v1/admin/reputation-weights`
///
/// Reads are open to every member; writes need admin or owner and request
/// a recompute for the whole tenant.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    jobs,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use repute_shared::{
    auth::{authorization::require_role, middleware::AuthContext},
    models::{
        membership::MembershipRole,
        question::{Question, QuestionInput},
        reputation_job::JobReason,
        reputation_weights::{ReputationWeights, WeightsInput},
    },
};
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route(
            "/questions/:id",
            get(get_question).put(update_question).delete(delete_question),
        )
        .route(
            "/reputation-weights",
            get(get_weights).put(update_weights),
        )
}

fn question_not_found() -> ApiError {
    ApiError::NotFound("Question not found".to_string())
}

pub async fn list_questions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Question>>> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    Ok(Json(Question::list(&state.db, auth.tenant_id).await?))
}

pub async fn create_question(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<QuestionInput>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    require_role(&state.db, &auth, MembershipRole::Admin).await?;
    input.validate()?;

    let question = Question::create(&state.db, auth.tenant_id, input).await?;
    jobs::enqueue_tenant(&state.db, auth.tenant_id, JobReason::QuestionsChanged);
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_question(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Question>> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    Question::find(&state.db, auth.tenant_id, id)
        .await?
        .map(Json)
        .ok_or_else(question_not_found)
}

pub async fn update_question(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<QuestionInput>,
) -> ApiResult<Json<Question>> {
    require_role(&state.db, &auth, MembershipRole::Admin).await?;
    input.validate()?;

    let question = Question::update(&state.db, auth.tenant_id, id, input)
        .await?
        .ok_or_else(question_not_found)?;
    jobs::enqueue_tenant(&state.db, auth.tenant_id, JobReason::QuestionsChanged);
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&state.db, &auth, MembershipRole::Admin).await?;
    if !Question::deactivate(&state.db, auth.tenant_id, id).await? {
        return Err(question_not_found());
    }
    jobs::enqueue_tenant(&state.db, auth.tenant_id, JobReason::QuestionsChanged);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_weights(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ReputationWeights>> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    Ok(Json(
        ReputationWeights::for_tenant(&state.db, auth.tenant_id).await?,
    ))
}

pub async fn update_weights(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<WeightsInput>,
) -> ApiResult<Json<ReputationWeights>> {
    require_role(&state.db, &auth, MembershipRole::Admin).await?;
    input.validate()?;

    let weights =
        ReputationWeights::upsert(&state.db, auth.tenant_id, &input, auth.user_id).await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        updated_by = %auth.user_id,
        "Reputation weights updated"
    );
    jobs::enqueue_tenant(&state.db, auth.tenant_id, JobReason::WeightsUpdated);

    Ok(Json(weights))
}
