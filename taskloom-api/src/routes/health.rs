use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::app::AppState;
use crate::envelope;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
}

/// GET /health
///
/// Reports process liveness plus the reachability of both backing stores.
/// Always answers 200; a degraded dependency is reported in the body so
/// probes can distinguish "down" from "up but impaired".
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            "down"
        }
    };

    let cache = match state.cache.ping().await {
        Ok(true) => "up",
        Ok(false) => {
            tracing::warn!("Health check: cache ping returned an unexpected reply");
            "down"
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check: cache unreachable");
            "down"
        }
    };

    let status = if database == "up" && cache == "up" {
        "ok"
    } else {
        "degraded"
    };

    envelope::ok(HealthStatus {
        status,
        version: taskloom_shared::VERSION,
        database,
        cache,
    })
}
