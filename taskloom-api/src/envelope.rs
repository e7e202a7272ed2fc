/// Response envelope builder
///
/// Every endpoint wraps its payload in the uniform envelope:
///
/// ```json
/// { "success": true, "data": { ... }, "meta": { ... } }
/// ```
///
/// (`meta` is present only on paginated list responses). Errors use the
/// mirror-image shape built by `crate::error`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,

    pub data: T,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ListMeta>,
}

/// Pagination metadata attached to list responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListMeta {
    /// 1-based page number
    pub page: u32,

    /// Page size
    pub limit: u32,

    /// Total rows matching the filter
    pub total: i64,

    /// True iff pages remain: `page * limit < total`
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl ListMeta {
    /// Builds pagination metadata from page, limit, and total
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            has_more: (page as i64) * (limit as i64) < total,
        }
    }
}

/// Wraps data in a 200 envelope
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        data,
        meta: None,
    })
    .into_response()
}

/// Wraps data in a 201 envelope
pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            data,
            meta: None,
        }),
    )
        .into_response()
}

/// Wraps a list page in a 200 envelope with pagination metadata
pub fn paginated<T: Serialize>(data: T, meta: ListMeta) -> Response {
    Json(Envelope {
        success: true,
        data,
        meta: Some(meta),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more_boundary() {
        // page * limit < total  <=>  hasMore
        assert!(ListMeta::new(1, 20, 21).has_more);
        assert!(!ListMeta::new(1, 20, 20).has_more);
        assert!(!ListMeta::new(2, 20, 40).has_more);
        assert!(ListMeta::new(2, 20, 41).has_more);
        assert!(!ListMeta::new(1, 20, 0).has_more);
    }

    #[test]
    fn test_meta_serializes_camel_case_has_more() {
        let json = serde_json::to_value(ListMeta::new(1, 20, 50)).unwrap();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["page"], 1);
        assert_eq!(json["total"], 50);
    }

    #[test]
    fn test_envelope_omits_absent_meta() {
        let envelope = Envelope {
            success: true,
            data: serde_json::json!({"id": 1}),
            meta: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("meta").is_none());
    }
}
