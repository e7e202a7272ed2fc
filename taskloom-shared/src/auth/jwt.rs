/// JWT token issuance and verification
///
/// Tokens are signed with HS256 (HMAC-SHA256) and carry the caller's
/// identity. A token is the only sanctioned way a handler learns who is
/// calling.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Expiration**: fixed 1 hour from issuance
/// - **Validation**: signature and expiry; the payload must decode into the
///   fully-typed [`Claims`] struct, so a missing or mistyped field fails
///   verification rather than producing a partially-trusted identity
///
/// # Example
///
/// ```
/// use taskloom_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new(42, "user@example.com", "Ada");
/// let token = create_token(&claims, "your-secret-key-at-least-32-bytes")?;
///
/// let validated = validate_token(&token, "your-secret-key-at-least-32-bytes")?;
/// assert_eq!(validated.sub, 42);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Fixed token lifetime: 1 hour from issuance
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token failed verification (bad signature, malformed structure, or a
    /// missing/mistyped payload field)
    #[error("Invalid token")]
    Invalid,
}

/// JWT claims structure
///
/// # Claims
///
/// - `sub`: user ID (integer)
/// - `email`: user email
/// - `name`: user display name
/// - `iat`: issued-at timestamp
/// - `exp`: expiration timestamp
///
/// All identity fields are required; `serde` enforces presence and typing
/// when the token is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: i64,

    /// User email
    pub email: String,

    /// User display name
    pub name: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates new claims expiring [`TOKEN_LIFETIME_SECS`] from now
    pub fn new(user_id: i64, email: &str, name: &str) -> Self {
        let now = Utc::now();
        let expiration = now + Duration::seconds(TOKEN_LIFETIME_SECS);

        Self {
            sub: user_id,
            email: email.to_string(),
            name: name.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }

    /// Creates claims with a custom expiration, used by expiry tests
    pub fn with_expiration(user_id: i64, email: &str, name: &str, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            email: email.to_string(),
            name: name.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Creates a signed token from claims
///
/// # Security
///
/// The secret should be at least 32 bytes (256 bits) for HS256, randomly
/// generated, and stored outside the codebase. Secret length is enforced at
/// configuration load.
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a token and extracts its claims
///
/// Verifies the signature and expiry, and requires the payload to decode
/// into the fully-typed [`Claims`] struct.
///
/// # Errors
///
/// - `JwtError::Expired` when the token's `exp` has passed, the only
///   failure distinguished to callers
/// - `JwtError::Invalid` for every other failure (bad signature, malformed
///   token, missing or mistyped payload field)
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new(7, "a@x.com", "A");

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.name, "A");
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_SECS);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = Claims::new(42, "user@example.com", "Ada");
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, 42);
        assert_eq!(validated.email, "user@example.com");
        assert_eq!(validated.name, "Ada");
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::new(1, "a@x.com", "A");
        let token = create_token(&claims, "secret-one-at-least-32-bytes-long!!").unwrap();

        let result = validate_token(&token, "secret-two-at-least-32-bytes-long!!");
        assert!(matches!(result, Err(JwtError::Invalid)));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(1, "a@x.com", "A", Duration::seconds(-120));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        let result = validate_token(&token, SECRET);

        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_garbage_token() {
        assert!(matches!(
            validate_token("not-a-token", SECRET),
            Err(JwtError::Invalid)
        ));
        assert!(matches!(
            validate_token("a.b.c", SECRET),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_partially_typed_payload_rejected() {
        // Token signed with the right key but whose payload lacks the
        // required identity fields must not verify
        #[derive(Serialize)]
        struct Partial {
            sub: i64,
            exp: i64,
        }

        let partial = Partial {
            sub: 1,
            exp: Utc::now().timestamp() + 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &partial,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_mistyped_payload_field_rejected() {
        // `sub` as a string instead of an integer is a malformed token
        #[derive(Serialize)]
        struct Mistyped {
            sub: String,
            email: String,
            name: String,
            iat: i64,
            exp: i64,
        }

        let mistyped = Mistyped {
            sub: "42".to_string(),
            email: "a@x.com".to_string(),
            name: "A".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &mistyped,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::Invalid)
        ));
    }
}
