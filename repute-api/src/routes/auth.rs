/// Authentication endpoints
///
/// - `POST /v1/auth/register`
/// - `POST /v1/auth/login`
/// - `POST /v1/auth/refresh`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Json};
use repute_shared::{
    auth::{jwt, password},
    models::{
        membership::{CreateMembership, Membership, MembershipRole},
        profile::Profile,
        tenant::{personal_tenant_name, CreateTenant, Tenant},
        user::{CreateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Tenant name must be 1 to 100 characters"))]
    pub tenant_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    /// Tenant to sign into; defaults to the oldest membership
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Creates the user with a personal tenant, owner membership and empty profile
///
/// All four rows are written in one transaction.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;

    let issues = password::password_strength_issues(&req.password);
    if !issues.is_empty() {
        return Err(ApiError::ValidationError(
            issues
                .into_iter()
                .map(|message| ValidationErrorDetail {
                    field: "password".to_string(),
                    message: message.to_string(),
                })
                .collect(),
        ));
    }

    let password_hash = password::hash_password(&req.password)?;
    let email = req.email.trim().to_string();
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email,
            password_hash,
            name: name.clone(),
            avatar_url: None,
        },
    )
    .await?;

    let tenant = Tenant::create(
        &mut *tx,
        CreateTenant {
            name: req
                .tenant_name
                .unwrap_or_else(|| personal_tenant_name(name.as_deref())),
        },
    )
    .await?;

    Membership::create(
        &mut *tx,
        CreateMembership {
            tenant_id: tenant.id,
            user_id: user.id,
            role: MembershipRole::Owner,
        },
    )
    .await?;

    Profile::ensure(&mut *tx, tenant.id, user.id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "User registered");

    let tokens = jwt::issue_token_pair(user.id, tenant.id, state.jwt_secret())?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id: user.id,
            tenant_id: tenant.id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let memberships = Membership::list_by_user(&state.db, user.id).await?;
    let tenant_id = match req.tenant_id {
        Some(wanted) => memberships
            .iter()
            .find(|m| m.tenant_id == wanted)
            .map(|m| m.tenant_id)
            .ok_or_else(|| ApiError::Forbidden("Not a member of this tenant".to_string()))?,
        None => memberships
            .first()
            .map(|m| m.tenant_id)
            .ok_or_else(|| ApiError::InternalError("User has no tenant membership".to_string()))?,
    };

    User::update_last_login(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, tenant_id = %tenant_id, "User logged in");

    let tokens = jwt::issue_token_pair(user.id, tenant_id, state.jwt_secret())?;
    Ok(Json(SessionResponse {
        user_id: user.id,
        tenant_id,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;
    Ok(Json(RefreshResponse { access_token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            name: None,
            tenant_name: Some(String::new()),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("tenant_name"));
    }

    #[test]
    fn test_register_request_valid() {
        let req = RegisterRequest {
            email: "ada@example.com".to_string(),
            password: "Sup3r$ecret".to_string(),
            name: Some("Ada".to_string()),
            tenant_name: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_login_request_tenant_is_optional() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"ada@example.com","password":"x"}"#).unwrap();
        assert!(req.tenant_id.is_none());
    }
}
