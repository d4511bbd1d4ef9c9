/// Verification invites sent by the caller
///
/// - `POST /v1/invites`: the plaintext token is returned only here
/// - `GET  /v1/invites`
/// - `GET  /v1/invites/:id`

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
use chrono::Utc;
use super::records::accept_write;
use repute_shared::{
    auth::{invite_token::generate_invite_token, middleware::AuthContext},
    models::{
        reputation_job::JobReason,
        user::User,
        verification_invite::{find_subject, CreateInvite, SubjectKind, VerificationInvite},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInviteRequest {
    pub subject_kind: SubjectKind,

    pub subject_id: Uuid,

    #[validate(email(message = "Invalid email format"))]
    pub verifier_email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    #[serde(flatten)]
    pub invite: VerificationInvite,

    /// Shown once; only its hash is stored
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invites).post(create_invite))
        .route("/:id", get(get_invite))
}

pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<CreateInviteResponse>)> {
    accept_write(&state, &auth, &req).await?;
    let verifier_email = req.verifier_email.trim().to_string();

    let caller = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;
    if caller.email.eq_ignore_ascii_case(&verifier_email) {
        return Err(ApiError::invalid(
            "verifier_email",
            "You cannot verify your own record",
        ));
    }

    find_subject(
        &state.db,
        req.subject_kind,
        auth.tenant_id,
        auth.user_id,
        req.subject_id,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Subject not found".to_string()))?;

    let (token, token_hash) = generate_invite_token();
    let invite = VerificationInvite::create(
        &state.db,
        CreateInvite {
            tenant_id: auth.tenant_id,
            user_id: auth.user_id,
            subject_kind: req.subject_kind,
            subject_id: req.subject_id,
            verifier_email,
            token_hash,
            expires_at: Utc::now() + state.invite_ttl(),
        },
    )
    .await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        user_id = %auth.user_id,
        invite_id = %invite.id,
        subject_kind = invite.subject_kind.as_str(),
        "Verification invite created"
    );
    jobs::enqueue(&state.db, auth.tenant_id, auth.user_id, JobReason::InviteSent);

    Ok((StatusCode::CREATED, Json(CreateInviteResponse { invite, token })))
}

pub async fn list_invites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<VerificationInvite>>> {
    Ok(Json(
        VerificationInvite::list(&state.db, auth.tenant_id, auth.user_id).await?,
    ))
}

pub async fn get_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VerificationInvite>> {
    VerificationInvite::find(&state.db, auth.tenant_id, auth.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Invite not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_invite_request_parsing() {
        let req: CreateInviteRequest = serde_json::from_value(serde_json::json!({
            "subject_kind": "client_project",
            "subject_id": Uuid::nil(),
            "verifier_email": "client@example.com"
        }))
        .unwrap();
        assert_eq!(req.subject_kind, SubjectKind::ClientProject);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_unknown_subject_kind_rejected() {
        let parsed: Result<CreateInviteRequest, _> = serde_json::from_value(serde_json::json!({
            "subject_kind": "education",
            "subject_id": Uuid::nil(),
            "verifier_email": "client@example.com"
        }));
        assert!(parsed.is_err());
    }
}
