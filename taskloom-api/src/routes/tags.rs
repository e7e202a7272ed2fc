/// Tag endpoints
///
/// Tags are flat per-user labels. Names are stored lowercased and are
/// unique per user; a duplicate create surfaces as 409 from the unique
/// constraint.

use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use serde::{Deserialize, Serialize};
use validator::Validate;

use taskloom_shared::models::tag::{CreateTag, Tag};

use crate::app::{AppState, AuthContext};
use crate::envelope;
use crate::error::ApiError;
use crate::extract::{Json, Path};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50, message = "Tag name must be 1-50 characters"))]
    pub name: String,

    /// Hex color like `#ff8800`; defaults server-side when absent
    #[validate(regex(path = *HEX_COLOR, message = "Color must be a hex value like #ff8800"))]
    pub color: Option<String>,
}

static HEX_COLOR: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// Fallback color applied when the client does not pick one
const DEFAULT_COLOR: &str = "#808080";

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

/// GET /tags
pub async fn list_tags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    let tags = Tag::list(&state.db, auth.user_id).await?;
    Ok(envelope::ok(tags))
}

/// POST /tags
pub async fn create_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateTagRequest>,
) -> Result<Response, ApiError> {
    body.validate()
        .map_err(|e| ApiError::BadRequest(super::auth::flatten_validation(&e)))?;

    let tag = Tag::create(
        &state.db,
        CreateTag {
            user_id: auth.user_id,
            name: body.name,
            color: body.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        },
    )
    .await?;

    tracing::info!(user_id = auth.user_id, tag_id = tag.id, "Tag created");

    Ok(envelope::created(tag))
}

/// DELETE /tags/:id
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tag_id): Path<i64>,
) -> Result<Response, ApiError> {
    let deleted = Tag::delete(&state.db, auth.user_id, tag_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Tag not found".into()));
    }

    tracing::info!(user_id = auth.user_id, tag_id, "Tag deleted");

    Ok(envelope::ok(DeleteResponse {
        message: "Tag deleted",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_name_bounds() {
        let valid = CreateTagRequest {
            name: "work".into(),
            color: None,
        };
        assert!(valid.validate().is_ok());

        let blank = CreateTagRequest {
            name: String::new(),
            color: None,
        };
        assert!(blank.validate().is_err());

        let long = CreateTagRequest {
            name: "x".repeat(51),
            color: None,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_color_validation() {
        let valid = CreateTagRequest {
            name: "work".into(),
            color: Some("#FF8800".into()),
        };
        assert!(valid.validate().is_ok());

        for bad in ["ff8800", "#ff880", "#gg8800", "red", "#ff88001"] {
            let request = CreateTagRequest {
                name: "work".into(),
                color: Some(bad.into()),
            };
            assert!(request.validate().is_err(), "{bad} should be rejected");
        }
    }
}
