/// Authentication endpoints
///
/// Registration and login both answer with the same shape, a signed token
/// plus the public user record, so clients have a single happy path.
/// Login failures are deliberately indistinguishable: unknown email and
/// wrong password produce the same message, and the unknown-email branch
/// still runs a full credential verification against a fixed dummy value
/// so response timing does not leak account existence.

use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use serde::{Deserialize, Serialize};
use validator::Validate;

use taskloom_shared::auth::jwt::{self, Claims};
use taskloom_shared::auth::password::{self, DUMMY_HASH};
use taskloom_shared::models::user::{CreateUser, User};

use crate::app::{AppState, AuthContext};
use crate::envelope;
use crate::error::ApiError;
use crate::extract::Json;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a user, safe to return to clients
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// POST /auth/register
///
/// Creates an account and returns a token immediately, no separate login
/// round-trip. A duplicate email surfaces as 409 from the unique
/// constraint rather than a pre-check, which would race.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    body.validate()
        .map_err(|e| ApiError::BadRequest(flatten_validation(&e)))?;

    let password_hash = password::hash_password(&body.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: body.email,
            name: body.name,
            password_hash,
        },
    )
    .await?;

    let claims = Claims::new(user.id, &user.email, &user.name);
    let token = jwt::create_token(&claims, &state.config.jwt.secret)?;

    tracing::info!(user_id = user.id, "User registered");

    Ok(envelope::created(AuthResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = User::find_by_email(&state.db, &body.email).await?;

    // Verify against a dummy hash when the email is unknown so both
    // branches cost the same
    let stored = user.as_ref().map(|u| u.password_hash.as_str());
    let verified = password::verify_password(&body.password, stored.unwrap_or(DUMMY_HASH))?;

    let Some(user) = user.filter(|_| verified) else {
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    };

    let claims = Claims::new(user.id, &user.email, &user.name);
    let token = jwt::create_token(&claims, &state.config.jwt.secret)?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(envelope::ok(AuthResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

/// GET /auth/me
///
/// Answers from the verified token alone; no database read.
pub async fn me(Extension(auth): Extension<AuthContext>) -> Response {
    envelope::ok(UserResponse {
        id: auth.user_id,
        email: auth.email,
        name: auth.name,
    })
}

/// Collapses validator output into a single client-facing message
pub(crate) fn flatten_validation(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "user@example.com".into(),
            name: "Ada".into(),
            password: "longenough".into(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".into(),
            name: "Ada".into(),
            password: "longenough".into(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            email: "user@example.com".into(),
            name: "Ada".into(),
            password: "short".into(),
        };
        assert!(short_password.validate().is_err());

        let empty_name = RegisterRequest {
            email: "user@example.com".into(),
            name: String::new(),
            password: "longenough".into(),
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_validation_message_flattening() {
        let bad = RegisterRequest {
            email: "nope".into(),
            name: "Ada".into(),
            password: "longenough".into(),
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(flatten_validation(&errors), "Invalid email address");
    }

    #[test]
    fn test_user_response_excludes_credentials() {
        let user = User {
            id: 7,
            email: "user@example.com".into(),
            name: "Ada".into(),
            password_hash: "pbkdf2-sha256$100000$aa$bb".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(UserResponse::from(&user)).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
    }
}
