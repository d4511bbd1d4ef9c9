/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`. Client errors keep their message;
/// internal errors are logged and replaced by a generic message.
///
/// # Example
///
/// ```
/// use repute_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(id: Option<u32>) -> ApiResult<Json<serde_json::Value>> {
///     let id = id.ok_or_else(|| ApiError::NotFound("Record not found".to_string()))?;
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use repute_shared::auth::{authorization::AuthzError, jwt::JwtError, password::PasswordError};
use repute_shared::reputation::ReputationError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409
    Conflict(String),

    /// 422
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500, message is logged and never sent
    InternalError(String),

    /// 503
    ServiceUnavailable(String),
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code such as `not_found`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        if status.is_client_error() {
            tracing::debug!(status = status.as_u16(), error = error_code, message = %message, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Human wording for a unique constraint
fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some(c) if c.contains("email") => "Email already exists".to_string(),
        Some("uq_skills_user_tag") => "Skill already exists".to_string(),
        Some(c) if c.starts_with("memberships") => "User is already a member".to_string(),
        Some(c) if c.starts_with("invite_answers") => "Question answered twice".to_string(),
        Some(c) => format!("Constraint violation: {}", c),
        None => "Resource already exists".to_string(),
    }
}

/// SQLSTATE class 22 codes a client can cause with its input
fn is_data_exception(code: Option<&str>) -> bool {
    matches!(
        code,
        Some(STRING_TOO_LONG) | Some(NUMERIC_OUT_OF_RANGE) | Some(INVALID_DATETIME)
    )
}

const STRING_TOO_LONG: &str = "22001";
const NUMERIC_OUT_OF_RANGE: &str = "22003";
const INVALID_DATETIME: &str = "22008";

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict(conflict_message(db_err.constraint()))
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                ApiError::invalid(db_err.constraint().unwrap_or("body"), "Value out of range")
            }
            sqlx::Error::Database(db_err) if is_data_exception(db_err.code().as_deref()) => {
                ApiError::invalid("body", db_err.message().to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => ApiError::Forbidden("Not a member of this tenant".to_string()),
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::DatabaseError(err) => ApiError::from(err),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::WrongTokenType { expected } => {
                ApiError::Unauthorized(format!("Expected a {} token", expected))
            }
            JwtError::ValidationError(_) => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl From<ReputationError> for ApiError {
    fn from(err: ReputationError) -> Self {
        match err {
            ReputationError::NotAMember { .. } => {
                ApiError::NotFound("User is not a member of this tenant".to_string())
            }
            ReputationError::Database(err) => ApiError::from(err),
            ReputationError::Serialization(err) => {
                ApiError::InternalError(format!("Breakdown serialization failed: {}", err))
            }
        }
    }
}

/// Struct-level errors land under `__all__` and name their field in a param
fn detail_field(field: &str, error: &validator::ValidationError) -> String {
    match error.params.get("field").and_then(|target| target.as_str()) {
        Some(target) if field == "__all__" => target.to_string(),
        _ if field == "__all__" => "body".to_string(),
        _ => field.to_string(),
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: detail_field(field, e),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use validator::Validate;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::invalid("end_date", "must not precede start_date");
        assert_eq!(err.to_string(), "Validation failed: 1 errors");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound(String::new()).into_response().status(), 404);
        assert_eq!(ApiError::Conflict(String::new()).into_response().status(), 409);
        assert_eq!(ApiError::invalid("a", "b").into_response().status(), 422);
        assert_eq!(
            ApiError::InternalError("secret detail".to_string()).into_response().status(),
            500
        );
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        assert!(matches!(ApiError::from(sqlx::Error::RowNotFound), ApiError::NotFound(_)));
    }

    #[test]
    fn test_other_sqlx_errors_are_internal() {
        assert!(matches!(
            ApiError::from(sqlx::Error::PoolTimedOut),
            ApiError::InternalError(_)
        ));
    }

    #[test]
    fn test_conflict_messages() {
        assert_eq!(conflict_message(Some("users_email_key")), "Email already exists");
        assert_eq!(conflict_message(Some("uq_skills_user_tag")), "Skill already exists");
        assert_eq!(conflict_message(Some("memberships_pkey")), "User is already a member");
        assert_eq!(conflict_message(None), "Resource already exists");
    }

    #[test]
    fn test_jwt_errors_map_to_401() {
        assert!(matches!(ApiError::from(JwtError::Expired), ApiError::Unauthorized(_)));
        assert!(matches!(
            ApiError::from(JwtError::WrongTokenType { expected: "refresh" }),
            ApiError::Unauthorized(msg) if msg.contains("refresh")
        ));
        assert!(matches!(
            ApiError::from(JwtError::CreateError("boom".to_string())),
            ApiError::InternalError(_)
        ));
    }

    #[test]
    fn test_reputation_not_a_member_is_404() {
        let err = ReputationError::NotAMember {
            tenant_id: Uuid::nil(),
            user_id: Uuid::nil(),
        };
        assert!(matches!(ApiError::from(err), ApiError::NotFound(_)));
    }

    #[derive(Validate)]
    struct SignupForm {
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[validate(length(min = 1))]
        name: String,
    }

    #[test]
    fn test_validator_errors_become_details() {
        let form = SignupForm {
            email: "nope".to_string(),
            name: String::new(),
        };
        let err = ApiError::from(form.validate().unwrap_err());
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0].field, "email");
                assert_eq!(details[0].message, "Invalid email format");
                assert_eq!(details[1].field, "name");
                assert!(details[1].message.contains("length"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_data_exceptions_are_client_errors() {
        assert!(is_data_exception(Some("22001")));
        assert!(is_data_exception(Some("22003")));
        assert!(!is_data_exception(Some("23505")));
        assert!(!is_data_exception(None));
    }

    #[test]
    fn test_schema_errors_point_at_their_field() {
        use repute_shared::models::employment::EmploymentInput;

        let input = EmploymentInput {
            company: "Acme".to_string(),
            title: "x".repeat(256),
            start_date: chrono::NaiveDate::from_ymd_opt(2022, 1, 1),
            end_date: chrono::NaiveDate::from_ymd_opt(2021, 1, 1),
            is_current: false,
            description: None,
        };
        match ApiError::from(input.validate().unwrap_err()) {
            ApiError::ValidationError(details) => {
                let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["end_date", "title"]);
                assert_eq!(details[0].message, "Must not precede the start date");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
