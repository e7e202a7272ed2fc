/// Authentication utilities
///
/// This module provides the credential and token services:
///
/// - `password`: PBKDF2-HMAC-SHA256 password hashing and constant-time
///   verification
/// - `jwt`: signed bearer-token issuance and verification

pub mod jwt;
pub mod password;
