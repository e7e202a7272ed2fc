/// Error boundary for the API server
///
/// Every handler returns `Result<T, ApiError>`; this module is the single
/// exhaustive mapping from domain errors to transport responses. Nothing
/// escapes it: panics anywhere in the pipeline are converted to the same
/// generic 500 envelope by the catch-panic layer in `app.rs`.
///
/// # Classification
///
/// - Recognized domain errors (`ApiError` variants other than
///   `InternalError`) map 1:1 to an envelope with a stable machine code and
///   are logged at warn level.
/// - Anything unanticipated becomes `InternalError`: full detail is logged
///   at error level server-side and the client receives a generic 500 with
///   no internal detail.
///
/// # Example
///
/// ```
/// use taskloom_api::error::{ApiError, ApiResult};
///
/// async fn handler() -> ApiResult<&'static str> {
///     Err(ApiError::NotFound("Task not found".to_string()))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
///
/// Variants carry the human-readable message; the machine code and status
/// come from the exhaustive mapping in `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), malformed or invalid input
    BadRequest(String),

    /// Unauthorized (401), missing/invalid/expired credential
    ///
    /// Messages are intentionally uninformative to prevent enumeration.
    Unauthorized(String),

    /// Forbidden (403), request blocked or authorization denied
    Forbidden,

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), uniqueness violation
    Conflict(String),

    /// Too many requests (429), with the retry delay in seconds
    RateLimited { retry_after: u64 },

    /// Internal server error (500); detail is logged, never returned
    InternalError(String),
}

/// Error body inside the envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. "NOT_FOUND"
    pub code: String,

    /// Human-readable message
    pub message: String,
}

/// Error envelope: `{"success": false, "error": {code, message}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Builds the envelope for a code/message pair
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::RateLimited { retry_after } => {
                write!(f, "Rate limited: retry after {}s", retry_after)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// The stable machine code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 429 carries a Retry-After header alongside the envelope
        if let ApiError::RateLimited { retry_after } = self {
            tracing::warn!(retry_after, "Request rate limited");

            let body = Json(ErrorEnvelope::new(
                "RATE_LIMITED",
                format!("Rate limit exceeded. Try again in {} seconds", retry_after),
            ));

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            return response;
        }

        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InternalError(msg) => {
                // Full detail stays server-side
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::RateLimited { .. } => unreachable!("handled above"),
        };

        if status != StatusCode::INTERNAL_SERVER_ERROR {
            tracing::warn!(code = self.code(), %status, "Request failed: {}", self);
        }

        let body = Json(ErrorEnvelope::new(self.code(), message));
        (status, body).into_response()
    }
}

/// Convert sqlx errors into API errors
///
/// Unique-constraint violations surface as 409; a missing row as 404;
/// everything else is internal.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    if let Some(constraint) = db_err.constraint() {
                        if constraint.contains("email") {
                            return ApiError::Conflict("Email already registered".to_string());
                        }
                        if constraint.contains("tags") {
                            return ApiError::Conflict("Tag name already exists".to_string());
                        }
                    }
                    return ApiError::Conflict("Resource already exists".to_string());
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert token errors into API errors
///
/// Expiry says "expired", every other failure says "invalid"; nothing
/// further is surfaced.
impl From<taskloom_shared::auth::jwt::JwtError> for ApiError {
    fn from(err: taskloom_shared::auth::jwt::JwtError) -> Self {
        use taskloom_shared::auth::jwt::JwtError;
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::Invalid => ApiError::Unauthorized("Invalid token".to_string()),
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
        }
    }
}

/// Convert password errors into API errors
///
/// Hash-format problems are a server defect, never a credential problem.
impl From<taskloom_shared::auth::password::PasswordError> for ApiError {
    fn from(err: taskloom_shared::auth::password::PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Task not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ApiError::BadRequest(String::new()).code(), "BAD_REQUEST");
        assert_eq!(ApiError::Unauthorized(String::new()).code(), "UNAUTHORIZED");
        assert_eq!(ApiError::Forbidden.code(), "FORBIDDEN");
        assert_eq!(ApiError::NotFound(String::new()).code(), "NOT_FOUND");
        assert_eq!(ApiError::Conflict(String::new()).code(), "CONFLICT");
        assert_eq!(ApiError::RateLimited { retry_after: 60 }.code(), "RATE_LIMITED");
        assert_eq!(ApiError::InternalError(String::new()).code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_rate_limited_carries_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let envelope: ErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.error.code, "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response =
            ApiError::InternalError("connection refused at 10.0.0.3:5432".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.3"));
        assert!(text.contains("INTERNAL_ERROR"));
    }

    #[test]
    fn test_jwt_error_mapping() {
        use taskloom_shared::auth::jwt::JwtError;

        let err: ApiError = JwtError::Expired.into();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token expired"));

        let err: ApiError = JwtError::Invalid.into();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid token"));
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
