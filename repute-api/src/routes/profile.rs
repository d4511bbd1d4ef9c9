/// Profile endpoints
///
/// - `GET /v1/profile`
/// - `PUT /v1/profile`: partial update, `null` clears a field

use super::records::accept_write;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    jobs,
};
use axum::{extract::State, Extension, Json};
use repute_shared::{
    auth::middleware::AuthContext,
    models::{
        profile::{Profile, UpdateProfile},
        reputation_job::JobReason,
    },
};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Profile>> {
    let profile = Profile::find(&state.db, auth.tenant_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<UpdateProfile>,
) -> ApiResult<Json<Profile>> {
    accept_write(&state, &auth, &update).await?;

    if update.is_empty() {
        return get_profile(State(state), Extension(auth)).await;
    }

    let profile = Profile::update(&state.db, auth.tenant_id, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::ProfileUpdated);
    Ok(Json(profile))
}
