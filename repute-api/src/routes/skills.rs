/// Skill endpoints
///
/// Same shape as the other record kinds. A skill name that normalizes to a
/// tag the caller already has is rejected with 409.

use super::records::accept_write;
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
        reputation_job::JobReason,
        skill::{Skill, SkillInput},
    },
};
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_skills).post(create_skill))
        .route("/:id", get(get_skill).put(update_skill).delete(delete_skill))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Skill not found".to_string())
}

pub async fn list_skills(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Skill>>> {
    Ok(Json(Skill::list(&state.db, auth.tenant_id, auth.user_id).await?))
}

pub async fn create_skill(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<SkillInput>,
) -> ApiResult<(StatusCode, Json<Skill>)> {
    accept_write(&state, &auth, &input).await?;
    let skill = Skill::create(&state.db, auth.tenant_id, auth.user_id, input).await?;
    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::RecordChanged);
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn get_skill(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Skill>> {
    Skill::find(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_skill(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<SkillInput>,
) -> ApiResult<Json<Skill>> {
    accept_write(&state, &auth, &input).await?;
    let skill = Skill::update(&state.db, auth.tenant_id, auth.user_id, id, input)
        .await?
        .ok_or_else(not_found)?;
    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::RecordChanged);
    Ok(Json(skill))
}

pub async fn delete_skill(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&state.db, &auth, MembershipRole::Member).await?;
    if !Skill::soft_delete(&state.db, auth.tenant_id, auth.user_id, id).await? {
        return Err(not_found());
    }
    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::RecordChanged);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_skill_input_rules() {
        let ok = SkillInput {
            name: "Rust".to_string(),
            years_of_experience: Some(4),
        };
        assert!(ok.validate().is_ok());

        let blank = SkillInput {
            name: " ".to_string(),
            years_of_experience: Some(-1),
        };
        match ApiError::from(blank.validate().unwrap_err()) {
            ApiError::ValidationError(details) => assert_eq!(details.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_skill_name_fits_column() {
        let at_limit = SkillInput {
            name: "r".repeat(100),
            years_of_experience: None,
        };
        assert!(at_limit.validate().is_ok());

        let too_long = SkillInput {
            name: "r".repeat(150),
            years_of_experience: None,
        };
        assert!(too_long.validate().unwrap_err().field_errors().contains_key("name"));
    }
}
