/// CRUD endpoints for profile records
///
/// Each kind is mounted under its own prefix with the same shape:
///
/// ```text
/// GET    /            list the caller's records
/// POST   /            create
/// GET    /:id
/// PUT    /:id         full replace
/// DELETE /:id         soft delete
/// ```
///
/// Every write requests a reputation recompute for the caller.

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
        certification::{Certification, CertificationInput},
        client_project::{ClientProject, ClientProjectInput},
        education::{Education, EducationInput},
        employment::{Employment, EmploymentInput},
        membership::MembershipRole,
        reputation_job::JobReason,
    },
};
use uuid::Uuid;
use validator::Validate;

/// Validates the body, then checks the caller may write in their tenant
///
/// Validation runs before the membership query.
pub(crate) async fn accept_write<T: Validate>(
    state: &AppState,
    auth: &AuthContext,
    input: &T,
) -> ApiResult<()> {
    input.validate()?;
    require_role(&state.db, auth, MembershipRole::Member).await?;
    Ok(())
}

fn not_found(kind: &str) -> ApiError {
    ApiError::NotFound(format!("{} not found", kind))
}

fn record_changed(state: &AppState, auth: &AuthContext) {
    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::RecordChanged);
}

// Education

pub fn education_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_educations).post(create_education))
        .route(
            "/:id",
            get(get_education).put(update_education).delete(delete_education),
        )
}

pub async fn list_educations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Education>>> {
    Ok(Json(Education::list(&state.db, auth.tenant_id, auth.user_id).await?))
}

pub async fn create_education(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<EducationInput>,
) -> ApiResult<(StatusCode, Json<Education>)> {
    accept_write(&state, &auth, &input).await?;
    let record = Education::create(&state.db, auth.tenant_id, auth.user_id, input).await?;
    record_changed(&state, &auth);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_education(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Education>> {
    Education::find(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Education"))
}

pub async fn update_education(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<EducationInput>,
) -> ApiResult<Json<Education>> {
    accept_write(&state, &auth, &input).await?;
    let record = Education::update(&state.db, auth.tenant_id, auth.user_id, id, input)
        .await?
        .ok_or_else(|| not_found("Education"))?;
    record_changed(&state, &auth);
    Ok(Json(record))
}

pub async fn delete_education(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&state.db, &auth, MembershipRole::Member).await?;
    if !Education::soft_delete(&state.db, auth.tenant_id, auth.user_id, id).await? {
        return Err(not_found("Education"));
    }
    record_changed(&state, &auth);
    Ok(StatusCode::NO_CONTENT)
}

// Certifications

pub fn certification_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_certifications).post(create_certification))
        .route(
            "/:id",
            get(get_certification)
                .put(update_certification)
                .delete(delete_certification),
        )
}

pub async fn list_certifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Certification>>> {
    Ok(Json(
        Certification::list(&state.db, auth.tenant_id, auth.user_id).await?,
    ))
}

pub async fn create_certification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CertificationInput>,
) -> ApiResult<(StatusCode, Json<Certification>)> {
    accept_write(&state, &auth, &input).await?;
    let record = Certification::create(&state.db, auth.tenant_id, auth.user_id, input).await?;
    record_changed(&state, &auth);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_certification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Certification>> {
    Certification::find(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Certification"))
}

pub async fn update_certification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<CertificationInput>,
) -> ApiResult<Json<Certification>> {
    accept_write(&state, &auth, &input).await?;
    let record = Certification::update(&state.db, auth.tenant_id, auth.user_id, id, input)
        .await?
        .ok_or_else(|| not_found("Certification"))?;
    record_changed(&state, &auth);
    Ok(Json(record))
}

pub async fn delete_certification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&state.db, &auth, MembershipRole::Member).await?;
    if !Certification::soft_delete(&state.db, auth.tenant_id, auth.user_id, id).await? {
        return Err(not_found("Certification"));
    }
    record_changed(&state, &auth);
    Ok(StatusCode::NO_CONTENT)
}

// Employment

pub fn employment_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_employments).post(create_employment))
        .route(
            "/:id",
            get(get_employment).put(update_employment).delete(delete_employment),
        )
}

pub async fn list_employments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Employment>>> {
    Ok(Json(Employment::list(&state.db, auth.tenant_id, auth.user_id).await?))
}

pub async fn create_employment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<EmploymentInput>,
) -> ApiResult<(StatusCode, Json<Employment>)> {
    accept_write(&state, &auth, &input).await?;
    let record = Employment::create(&state.db, auth.tenant_id, auth.user_id, input).await?;
    record_changed(&state, &auth);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_employment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Employment>> {
    Employment::find(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Employment"))
}

pub async fn update_employment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<EmploymentInput>,
) -> ApiResult<Json<Employment>> {
    accept_write(&state, &auth, &input).await?;
    let record = Employment::update(&state.db, auth.tenant_id, auth.user_id, id, input)
        .await?
        .ok_or_else(|| not_found("Employment"))?;
    record_changed(&state, &auth);
    Ok(Json(record))
}

pub async fn delete_employment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&state.db, &auth, MembershipRole::Member).await?;
    if !Employment::soft_delete(&state.db, auth.tenant_id, auth.user_id, id).await? {
        return Err(not_found("Employment"));
    }
    record_changed(&state, &auth);
    Ok(StatusCode::NO_CONTENT)
}

// Client projects

pub fn client_project_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_client_projects).post(create_client_project))
        .route(
            "/:id",
            get(get_client_project)
                .put(update_client_project)
                .delete(delete_client_project),
        )
}

pub async fn list_client_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ClientProject>>> {
    Ok(Json(
        ClientProject::list(&state.db, auth.tenant_id, auth.user_id).await?,
    ))
}

pub async fn create_client_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<ClientProjectInput>,
) -> ApiResult<(StatusCode, Json<ClientProject>)> {
    accept_write(&state, &auth, &input).await?;
    let record = ClientProject::create(&state.db, auth.tenant_id, auth.user_id, input).await?;
    record_changed(&state, &auth);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_client_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientProject>> {
    ClientProject::find(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Client project"))
}

pub async fn update_client_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<ClientProjectInput>,
) -> ApiResult<Json<ClientProject>> {
    accept_write(&state, &auth, &input).await?;
    let record = ClientProject::update(&state.db, auth.tenant_id, auth.user_id, id, input)
        .await?
        .ok_or_else(|| not_found("Client project"))?;
    record_changed(&state, &auth);
    Ok(Json(record))
}

pub async fn delete_client_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&state.db, &auth, MembershipRole::Member).await?;
    if !ClientProject::soft_delete(&state.db, auth.tenant_id, auth.user_id, id).await? {
        return Err(not_found("Client project"));
    }
    record_changed(&state, &auth);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn fields(input: &impl Validate) -> Vec<String> {
        match input.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => match ApiError::from(errors) {
                ApiError::ValidationError(details) => {
                    details.into_iter().map(|d| d.field).collect()
                }
                other => panic!("unexpected {:?}", other),
            },
        }
    }

    #[test]
    fn test_education_end_before_start() {
        let input = EducationInput {
            institution: "MIT".to_string(),
            degree: None,
            field_of_study: None,
            start_date: date(2020, 9, 1),
            end_date: date(2019, 6, 1),
        };
        assert_eq!(fields(&input), vec!["end_date"]);
    }

    #[test]
    fn test_blank_and_oversized_names() {
        let input = EducationInput {
            institution: "   ".to_string(),
            degree: Some("x".repeat(256)),
            field_of_study: Some("y".repeat(255)),
            start_date: None,
            end_date: None,
        };
        assert_eq!(fields(&input), vec!["degree", "institution"]);
    }

    #[test]
    fn test_current_employment_has_no_end() {
        let input = EmploymentInput {
            company: "Acme".to_string(),
            title: "Engineer".to_string(),
            start_date: date(2021, 1, 1),
            end_date: date(2022, 1, 1),
            is_current: true,
            description: None,
        };
        assert_eq!(fields(&input), vec!["end_date"]);
    }

    #[test]
    fn test_client_project_revenue_and_currency() {
        let input = ClientProjectInput {
            client_name: "Globex".to_string(),
            title: "Migration".to_string(),
            description: None,
            revenue_cents: Some(-5),
            currency: Some("EURO".to_string()),
            start_date: None,
            end_date: None,
        };
        assert_eq!(fields(&input), vec!["currency", "revenue_cents"]);

        let ok = ClientProjectInput {
            revenue_cents: Some(250_000),
            currency: Some("usd".to_string()),
            ..input
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_certification_url_fits_column() {
        let input = CertificationInput {
            name: "CKA".to_string(),
            issuer: Some("CNCF".to_string()),
            issued_on: date(2023, 1, 1),
            expires_on: date(2026, 1, 1),
            credential_url: Some("https://cncf.io/verify/abc".to_string()),
        };
        assert!(input.validate().is_ok());

        let long_url = CertificationInput {
            credential_url: Some(format!("https://cncf.io/{}", "a".repeat(1000))),
            ..input.clone()
        };
        assert_eq!(fields(&long_url), vec!["credential_url"]);

        let not_a_url = CertificationInput {
            credential_url: Some("cncf.io/verify".to_string()),
            ..input
        };
        assert_eq!(fields(&not_a_url), vec!["credential_url"]);
    }
}
