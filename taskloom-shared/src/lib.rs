//! # Taskloom Shared Library
//!
//! This crate contains the types and services shared by the Taskloom API
//! server: database models, the credential & token service, and the Redis
//! cache client used for task snapshots and rate-limit counters.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Password hashing and signed-token issuance/verification
//! - `cache`: Redis client and the cache-aside task cache

pub mod auth;
pub mod cache;
pub mod models;

/// Current version of the Taskloom shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
