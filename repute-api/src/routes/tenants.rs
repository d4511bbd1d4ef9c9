/// Tenant membership endpoints
///
/// - `GET  /v1/tenants/members`: any member
/// - `POST /v1/tenants/members`: admin or owner

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    jobs,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use repute_shared::{
    auth::{authorization::require_role, middleware::AuthContext},
    models::{
        membership::{CreateMembership, Membership, MembershipRole},
        profile::Profile,
        reputation_job::JobReason,
        user::User,
    },
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "default_role")]
    pub role: MembershipRole,
}

fn default_role() -> MembershipRole {
    MembershipRole::Member
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Membership>>> {
    require_role(&state.db, &auth, MembershipRole::Viewer).await?;
    Ok(Json(Membership::list_by_tenant(&state.db, auth.tenant_id).await?))
}

/// Adds an existing user to the caller's tenant
///
/// A caller can grant at most their own role.
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    req.validate()?;
    let caller_role = require_role(&state.db, &auth, MembershipRole::Admin).await?;

    if !caller_role.has_permission(&req.role) {
        return Err(ApiError::Forbidden(format!(
            "Cannot grant the {} role",
            req.role.as_str()
        )));
    }

    let user_id = User::id_for_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("No user with that email".to_string()))?;

    let mut tx = state.db.begin().await?;
    let membership = Membership::create(
        &mut *tx,
        CreateMembership {
            tenant_id: auth.tenant_id,
            user_id,
            role: req.role,
        },
    )
    .await?;
    Profile::ensure(&mut *tx, auth.tenant_id, user_id).await?;
    tx.commit().await?;

    tracing::info!(
        tenant_id = %auth.tenant_id,
        user_id = %user_id,
        role = req.role.as_str(),
        added_by = %auth.user_id,
        "Member added"
    );
    jobs::enqueue(&state.db, auth.tenant_id, user_id, JobReason::MemberAdded);

    Ok((StatusCode::CREATED, Json(membership)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_member_role_defaults_to_member() {
        let req: AddMemberRequest = serde_json::from_str(r#"{"email":"a@example.com"}"#).unwrap();
        assert_eq!(req.role, MembershipRole::Member);

        let req: AddMemberRequest =
            serde_json::from_str(r#"{"email":"a@example.com","role":"admin"}"#).unwrap();
        assert_eq!(req.role, MembershipRole::Admin);
    }
}
