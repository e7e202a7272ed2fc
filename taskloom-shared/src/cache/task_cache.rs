/// Cache-aside task cache
///
/// Two disjoint namespaces per user:
///
/// - `tasks:list:{user_id}` holds a snapshot of the default, unfiltered,
///   first-page list query only. Filtered, searched, or paginated queries
///   are never cached, keeping key fan-out and staleness surface bounded.
/// - `tasks:item:{user_id}:{task_id}` holds per-item snapshots.
///
/// # Protocol
///
/// Read path: check the cache; on hit return the deserialized snapshot
/// without touching Postgres; on miss query Postgres and populate the cache
/// with a 60-second TTL.
///
/// Write path: every task create/update/delete invalidates the user's list
/// entry (and for update/delete the item entry) synchronously, before the
/// response is produced, so no stale read can follow a completed write.
///
/// All operations are best-effort: a cache failure is logged at warn level
/// and the caller falls through to the store of record. A failed
/// invalidation still bounds staleness by the TTL.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::CacheClient;

/// Snapshot TTL in seconds
pub const SNAPSHOT_TTL_SECS: u64 = 60;

/// Cache-aside accessor for task snapshots
#[derive(Clone)]
pub struct TaskCache {
    client: CacheClient,
}

impl TaskCache {
    /// Creates a task cache on top of a cache client
    pub fn new(client: CacheClient) -> Self {
        Self { client }
    }

    /// Key for a user's default list snapshot
    pub fn list_key(user_id: i64) -> String {
        format!("tasks:list:{}", user_id)
    }

    /// Key for a single task snapshot
    pub fn item_key(user_id: i64, task_id: i64) -> String {
        format!("tasks:item:{}:{}", user_id, task_id)
    }

    /// Reads a cached snapshot, returning `None` on miss, expiry, a
    /// deserialization mismatch, or any cache failure
    pub async fn get_snapshot<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.client.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    // A snapshot written by an older build may not
                    // deserialize; treat it as a miss
                    tracing::warn!(key, error = %e, "Discarding undeserializable cache snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, falling through to database");
                None
            }
        }
    }

    /// Writes a snapshot with the fixed TTL; failures are logged and
    /// swallowed
    pub async fn put_snapshot<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache snapshot");
                return;
            }
        };

        if let Err(e) = self.client.set_ex(key, &raw, SNAPSHOT_TTL_SECS).await {
            tracing::warn!(key, error = %e, "Cache write failed, snapshot skipped");
        }
    }

    /// Invalidates a user's list snapshot
    pub async fn invalidate_list(&self, user_id: i64) {
        self.invalidate(&Self::list_key(user_id)).await;
    }

    /// Invalidates a single task snapshot
    pub async fn invalidate_item(&self, user_id: i64, task_id: i64) {
        self.invalidate(&Self::item_key(user_id, task_id)).await;
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.client.del(key).await {
            // Staleness is still bounded by the snapshot TTL
            tracing::warn!(key, error = %e, "Cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::client::CacheConfig;

    #[test]
    fn test_key_namespaces_are_disjoint() {
        assert_eq!(TaskCache::list_key(7), "tasks:list:7");
        assert_eq!(TaskCache::item_key(7, 31), "tasks:item:7:31");
        assert_ne!(TaskCache::list_key(7), TaskCache::item_key(7, 7));
    }

    #[test]
    fn test_item_keys_scoped_per_user() {
        // Two users caching the same task id must never collide
        assert_ne!(TaskCache::item_key(1, 5), TaskCache::item_key(2, 5));
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_snapshot_roundtrip_and_invalidation() {
        let client = CacheClient::new(CacheConfig {
            url: "redis://localhost:6379".to_string(),
            command_timeout_secs: 5,
        })
        .await
        .unwrap();
        let cache = TaskCache::new(client);

        let key = TaskCache::item_key(999, 1);
        cache.put_snapshot(&key, &serde_json::json!({"title": "T"})).await;

        let hit: Option<serde_json::Value> = cache.get_snapshot(&key).await;
        assert_eq!(hit.unwrap()["title"], "T");

        cache.invalidate_item(999, 1).await;
        let miss: Option<serde_json::Value> = cache.get_snapshot(&key).await;
        assert!(miss.is_none());
    }
}
