/// Redis cache utilities
///
/// This module provides:
///
/// - `client`: connection-managed Redis client with health checks
/// - `task_cache`: the cache-aside protocol for per-user task snapshots
///
/// The same Redis instance also backs the rate-limit counters; those are
/// managed by the API server's rate-limit middleware through the client
/// exposed here.

pub mod client;
pub mod task_cache;

pub use client::{CacheClient, CacheConfig, CacheError};
