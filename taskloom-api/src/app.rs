/// Application state and pipeline orchestrator
///
/// Builds the Axum router with the fixed middleware chain. Given one
/// inbound request, the pipeline produces exactly one outbound response;
/// no failure escapes it.
///
/// # Stage order (request direction)
///
/// 1. Panic boundary: any stage's unexpected panic becomes a safe 500
/// 2. Threat filter: hostile payloads never reach parsing, auth, or state
/// 3. CORS: preflights resolve before rate limiting so they cost no
///    quota, and answered preflights are rewritten to a no-body 204
/// 4. Rate limiter: throttle before any business logic or logging cost
/// 5. Tracing: times and records the rest of the chain under a
///    correlation id
/// 6. Router, then authentication (protected routes), then the handlers
/// 7. Security headers: stamped onto every response, success or error,
///    as the last step before transmission
///
/// Axum applies the most recently added layer outermost, so the `.layer`
/// calls below appear in the reverse of this list.
///
/// # Example
///
/// ```no_run
/// use taskloom_api::{app::AppState, config::Config};
/// use taskloom_shared::cache::{CacheClient, CacheConfig};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let db = PgPool::connect(&config.database.url).await?;
/// let cache = CacheClient::new(CacheConfig::from_env()?).await?;
/// let state = AppState::new(db, cache, config);
/// let app = taskloom_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::enrichment::Enricher;
use crate::error::ApiError;
use crate::middleware::{rate_limit, security::SecurityHeadersLayer, waf};
use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use taskloom_shared::auth::jwt;
use taskloom_shared::cache::{task_cache::TaskCache, CacheClient};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state
///
/// Cloned per request via Axum's `State` extractor; everything inside is a
/// handle. No shared mutable in-process state exists; everything
/// cross-request lives in Postgres and Redis.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (store of record)
    pub db: PgPool,

    /// Redis client (task snapshots + rate-limit counters)
    pub cache: CacheClient,

    /// Cache-aside accessor over `cache`
    pub task_cache: TaskCache,

    /// Application configuration
    pub config: Arc<Config>,

    /// AI enrichment client; `None` when no inference service is configured
    pub enricher: Option<Arc<Enricher>>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, cache: CacheClient, config: Config) -> Self {
        let enricher = config.ai.as_ref().map(|ai| Arc::new(Enricher::new(ai.clone())));
        Self {
            db,
            task_cache: TaskCache::new(cache.clone()),
            cache,
            config: Arc::new(config),
            enricher,
        }
    }

    /// Gets the JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Identity context derived per-request from a verified token
///
/// Injected into request extensions by `auth_layer`; the only sanctioned
/// way handlers learn who is calling. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub name: String,
}

impl From<jwt::Claims> for AuthContext {
    fn from(claims: jwt::Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// /
/// ├── GET  /health              # Liveness (public)
/// ├── /auth/
/// │   ├── POST /register        # Public
/// │   ├── POST /login           # Public
/// │   └── GET  /me              # Bearer
/// ├── /tasks/                   # Bearer
/// │   ├── GET    /              # Filtered, paginated list
/// │   ├── POST   /              # Create (triggers enrichment)
/// │   ├── GET    /:id
/// │   ├── PATCH  /:id
/// │   └── DELETE /:id
/// └── /tags/                    # Bearer
///     ├── GET    /
///     ├── POST   /
///     └── DELETE /:id
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route("/tasks", get(routes::tasks::list_tasks))
        .route("/tasks", post(routes::tasks::create_task))
        .route("/tasks/:id", get(routes::tasks::get_task))
        .route("/tasks/:id", patch(routes::tasks::update_task))
        .route("/tasks/:id", delete(routes::tasks::delete_task))
        .route("/tags", get(routes::tags::list_tags))
        .route("/tags", post(routes::tags::create_tag))
        .route("/tags/:id", delete(routes::tags::delete_tag))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_layer,
        ));

    // Any origin; the browser-visible surface is a pure bearer-token API,
    // so credentialed CORS is unnecessary
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %uuid::Uuid::new_v4(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_layer,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn(
            crate::middleware::preflight_no_content,
        ))
        .layer(axum::middleware::from_fn(waf::waf_layer))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Authentication middleware layer
///
/// Extracts the bearer token from the Authorization header, verifies it,
/// and injects [`AuthContext`] into request extensions. Every failure is a
/// 401 whose message distinguishes only expiry from everything else.
pub async fn auth_layer(
    state: axum::extract::State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;

    request.extensions_mut().insert(AuthContext::from(claims));

    Ok(next.run(request).await)
}

/// Converts a downstream panic into the generic 500 envelope
///
/// The panic payload is logged, never returned.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(crate::error::ErrorEnvelope::new(
            "INTERNAL_ERROR",
            "An internal error occurred",
        )),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_handler_hides_payload() {
        let response = handle_panic(Box::new("secret connection string".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_context_from_claims() {
        let claims = jwt::Claims::new(9, "a@x.com", "A");
        let ctx = AuthContext::from(claims);
        assert_eq!(ctx.user_id, 9);
        assert_eq!(ctx.email, "a@x.com");
        assert_eq!(ctx.name, "A");
    }
}
