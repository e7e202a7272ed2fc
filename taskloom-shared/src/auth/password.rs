/// Password hashing module using PBKDF2-HMAC-SHA256
///
/// Passwords are hashed with an iterated keyed derivation and stored in a
/// self-describing delimited format that carries the algorithm parameters
/// and the per-password salt:
///
/// ```text
/// pbkdf2-sha256$100000$<salt hex>$<derived hash hex>
/// ```
///
/// # Security
///
/// - **Algorithm**: PBKDF2 with HMAC-SHA256
/// - **Iterations**: 100,000
/// - **Salt**: 16 random bytes per password (OS RNG)
/// - **Output**: 32-byte derived hash
/// - **Comparison**: constant time, no early exit on the first mismatching
///   byte
///
/// Verification recomputes the derivation with the stored salt and iteration
/// count, so old hashes remain verifiable if the default cost is raised.
///
/// # Example
///
/// ```
/// use taskloom_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("super_secret_password_123")?;
/// assert!(verify_password("super_secret_password_123", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Number of PBKDF2 iterations for newly created hashes
pub const ITERATIONS: u32 = 100_000;

/// Salt length in bytes
const SALT_LEN: usize = 16;

/// Derived hash length in bytes
const HASH_LEN: usize = 32;

/// Scheme identifier stored in the hash string
const SCHEME: &str = "pbkdf2-sha256";

/// A precomputed hash of a random throwaway password.
///
/// Login flows verify the submitted password against this hash when no
/// account matches the email, so the latency of "no such account" is
/// indistinguishable from "wrong password". Never matches any real password.
pub const DUMMY_HASH: &str = "pbkdf2-sha256$100000$00000000000000000000000000000000$0000000000000000000000000000000000000000000000000000000000000000";

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password with a fresh random salt
///
/// # Returns
///
/// The delimited hash string, e.g.
/// `pbkdf2-sha256$100000$a1b2...$c3d4...`
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the derivation fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let derived = derive(password, &salt, ITERATIONS)?;

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        ITERATIONS,
        hex::encode(salt),
        hex::encode(derived)
    ))
}

/// Verifies a password against a stored hash
///
/// Recomputes the derivation with the stored salt and iteration count and
/// compares the result in constant time.
///
/// # Returns
///
/// `Ok(true)` if the password matches, `Ok(false)` if it does not.
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` if the stored hash is not in the
/// expected delimited format.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let (iterations, salt, expected) = parse_hash(stored)?;

    let derived = derive(password, &salt, iterations)?;

    // subtle's ct_eq examines every byte regardless of where the first
    // mismatch falls
    Ok(derived.ct_eq(expected.as_slice()).into())
}

/// Derives a hash from a password, salt, and iteration count
fn derive(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; HASH_LEN], PasswordError> {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut out)
        .map_err(|e| PasswordError::HashError(format!("Derivation failed: {}", e)))?;
    Ok(out)
}

/// Parses a stored hash string into (iterations, salt, hash)
fn parse_hash(stored: &str) -> Result<(u32, Vec<u8>, Vec<u8>), PasswordError> {
    let parts: Vec<&str> = stored.split('$').collect();

    if parts.len() != 4 {
        return Err(PasswordError::InvalidHash(format!(
            "Expected 4 delimited fields, found {}",
            parts.len()
        )));
    }

    if parts[0] != SCHEME {
        return Err(PasswordError::InvalidHash(format!(
            "Unknown scheme: {}",
            parts[0]
        )));
    }

    let iterations: u32 = parts[1]
        .parse()
        .map_err(|_| PasswordError::InvalidHash(format!("Bad iteration count: {}", parts[1])))?;

    let salt = hex::decode(parts[2])
        .map_err(|e| PasswordError::InvalidHash(format!("Bad salt encoding: {}", e)))?;

    let hash = hex::decode(parts[3])
        .map_err(|e| PasswordError::InvalidHash(format!("Bad hash encoding: {}", e)))?;

    if hash.len() != HASH_LEN {
        return Err(PasswordError::InvalidHash(format!(
            "Expected {}-byte hash, found {} bytes",
            HASH_LEN,
            hash.len()
        )));
    }

    Ok((iterations, salt, hash))
}
