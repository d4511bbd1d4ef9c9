/// Bearer-token authentication for axum
///
/// [`jwt_auth_middleware`] validates the `Authorization: Bearer <jwt>`
/// header and inserts an [`AuthContext`] into the request extensions.
/// Handlers read it with `Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use repute_shared::auth::middleware::{jwt_auth_middleware, AuthContext, JwtSecret};
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     auth.user_id.to_string()
/// }
///
/// let secret = JwtSecret::new("a-secret-of-at-least-thirty-two-bytes");
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn_with_state(secret, jwt_auth_middleware));
/// ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Shared signing secret handed to the middleware as state
#[derive(Clone)]
pub struct JwtSecret(Arc<str>);

impl JwtSecret {
    pub fn new(secret: impl AsRef<str>) -> Self {
        JwtSecret(Arc::from(secret.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Tenant the token was issued for
    pub tenant_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid, tenant_id: Uuid) -> Self {
        Self { user_id, tenant_id }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,

    InvalidFormat,

    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials".to_string())
            }
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "Expected a Bearer token".to_string(),
            ),
            AuthError::InvalidToken(message) => (StatusCode::UNAUTHORIZED, message),
        };

        let body = Json(serde_json::json!({
            "error": "unauthorized",
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Extracts the token from an `Authorization` header value
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Validates the access token and attaches an [`AuthContext`]
pub async fn jwt_auth_middleware(
    State(secret): State<JwtSecret>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = bearer_token(header_value).ok_or(AuthError::InvalidFormat)?;

    let claims = validate_access_token(token, secret.as_str()).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        JwtError::WrongTokenType { .. } => {
            AuthError::InvalidToken("Access token required".to_string())
        }
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    req.extensions_mut()
        .insert(AuthContext::new(claims.sub, claims.tenant_id));

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[test]
    fn test_auth_error_into_response() {
        for err in [
            AuthError::MissingCredentials,
            AuthError::InvalidFormat,
            AuthError::InvalidToken("nope".to_string()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_jwt_secret_as_str() {
        let secret = JwtSecret::new("abc");
        assert_eq!(secret.clone().as_str(), "abc");
    }
}
