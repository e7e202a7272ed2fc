/// Rate limiting middleware
///
/// Sliding-window-by-reset throttle, per client address, backed by the
/// Redis counter store.
///
/// # Algorithm
///
/// One integer counter per client, key `ratelimit:{client}`:
///
/// 1. Read the counter (absent counts as 0)
/// 2. At or above the threshold: reject with 429 and `Retry-After` equal to
///    the window length
/// 3. Otherwise write back counter + 1 with the TTL reset to the full
///    window
///
/// Resetting the TTL on every admit approximates a sliding window:
/// continuous traffic keeps extending the window, so a persistent client
/// can hold a window open indefinitely. That matches the specified
/// behavior; a token bucket would be the replacement if stricter fairness
/// were ever required.
///
/// Two requests racing the read-modify-write can each observe the same
/// count; last-write-wins and the occasional over-admit are accepted.
///
/// # Failure policy
///
/// Counter-store failures **fail open**: the request is admitted and the
/// failure logged at warn level. An unavailable cache degrades throttling,
/// it must not take the API down.
///
/// # Client identity
///
/// The trusted edge-provided connecting-IP header (configurable), falling
/// back to the socket peer address. Client-supplied forwarding headers are
/// never used.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use taskloom_shared::cache::CacheError;

use crate::app::AppState;
use crate::error::ApiError;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Admit; `new_count` is the counter value to write back, or `None`
    /// when the store was unreachable and there is nothing to write
    Admit { new_count: Option<u64> },

    /// Reject with this Retry-After value in seconds
    Reject { retry_after: u64 },
}

impl Decision {
    /// Pure decision math: given the current count, admit or reject.
    ///
    /// The threshold check happens before the increment, so request number
    /// `max_requests` is admitted and request `max_requests + 1` is not.
    pub fn evaluate(current: u64, max_requests: u64, window_secs: u64) -> Self {
        if current >= max_requests {
            Decision::Reject {
                retry_after: window_secs,
            }
        } else {
            Decision::Admit {
                new_count: Some(current + 1),
            }
        }
    }

    /// Maps a counter-store lookup into a decision.
    ///
    /// A store failure fails open: the request is admitted with no counter
    /// write-back. Throttling is advisory, availability is not.
    pub fn from_lookup(
        lookup: Result<u64, CacheError>,
        max_requests: u64,
        window_secs: u64,
    ) -> Self {
        match lookup {
            Ok(current) => Self::evaluate(current, max_requests, window_secs),
            Err(_) => Decision::Admit { new_count: None },
        }
    }
}

/// Counter key for a client address
fn counter_key(client: &str) -> String {
    format!("ratelimit:{}", client)
}

/// Rate limiting middleware layer
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let config = state.config.rate_limit;
    let client = super::client_addr(&request, &state.config.api.trusted_ip_header);
    let key = counter_key(&client);

    let lookup = state.cache.get_counter(&key).await;
    if let Err(ref e) = lookup {
        tracing::warn!(client = %client, error = %e, "Counter store unreachable, admitting request");
    }

    match Decision::from_lookup(lookup, config.max_requests, config.window_secs) {
        Decision::Reject { retry_after } => {
            tracing::warn!(client = %client, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }.into_response()
        }
        Decision::Admit { new_count } => {
            if let Some(count) = new_count {
                if let Err(e) = state
                    .cache
                    .set_ex(&key, &count.to_string(), config.window_secs)
                    .await
                {
                    tracing::warn!(client = %client, error = %e, "Counter write failed, admitting request");
                }
            }
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_admitted() {
        assert_eq!(
            Decision::evaluate(0, 60, 60),
            Decision::Admit { new_count: Some(1) }
        );
    }

    #[test]
    fn test_sixtieth_request_admitted_sixty_first_rejected() {
        // The 60th request sees count 59 and is admitted
        assert_eq!(
            Decision::evaluate(59, 60, 60),
            Decision::Admit {
                new_count: Some(60)
            }
        );

        // The 61st sees count 60 and is rejected with a positive delay
        match Decision::evaluate(60, 60, 60) {
            Decision::Reject { retry_after } => assert!(retry_after > 0),
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_after_equals_window() {
        assert_eq!(
            Decision::evaluate(100, 60, 60),
            Decision::Reject { retry_after: 60 }
        );
        assert_eq!(
            Decision::evaluate(10, 10, 30),
            Decision::Reject { retry_after: 30 }
        );
    }

    #[test]
    fn test_lookup_success_follows_decision_math() {
        assert_eq!(
            Decision::from_lookup(Ok(0), 60, 60),
            Decision::Admit { new_count: Some(1) }
        );
        assert_eq!(
            Decision::from_lookup(Ok(60), 60, 60),
            Decision::Reject { retry_after: 60 }
        );
    }

    #[test]
    fn test_store_failure_fails_open() {
        // An unreachable counter store admits the request and skips the
        // counter write-back entirely
        let decision = Decision::from_lookup(
            Err(CacheError::ConnectionError("connection refused".to_string())),
            60,
            60,
        );
        assert_eq!(decision, Decision::Admit { new_count: None });

        let decision = Decision::from_lookup(
            Err(CacheError::CommandError("timed out".to_string())),
            1,
            60,
        );
        assert_eq!(decision, Decision::Admit { new_count: None });
    }

    #[test]
    fn test_counter_key_is_per_client() {
        assert_eq!(counter_key("203.0.113.9"), "ratelimit:203.0.113.9");
        assert_ne!(counter_key("203.0.113.9"), counter_key("203.0.113.10"));
    }
}
