/// Threat filter middleware (WAF)
///
/// Runs first in the pipeline so obviously hostile payloads never reach
/// parsing, authentication, or state. The decoded request path and the raw
/// query string are inspected against three independent pattern classes:
///
/// - SQL-injection-like tokens
/// - Markup/script-injection tokens
/// - Directory-traversal sequences, including percent-encoded variants
///
/// Any match returns 403 with a generic "Forbidden" body; the matched
/// category is logged (with the client address) but never disclosed to the
/// client. Request bodies are not inspected. False positives are accepted
/// collateral of pattern matching.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::ApiError;

/// Pattern class that matched a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatCategory {
    SqlInjection,
    MarkupInjection,
    PathTraversal,
}

impl ThreatCategory {
    /// Category label for the warn log
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::SqlInjection => "sql_injection",
            ThreatCategory::MarkupInjection => "markup_injection",
            ThreatCategory::PathTraversal => "path_traversal",
        }
    }
}

static SQL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\bunion\b[\s/*]+\bselect\b|\bselect\b[\s/*]+.*\bfrom\b|\binsert\b\s+\binto\b|\bdrop\b\s+\btable\b|\bdelete\b\s+\bfrom\b|'\s*(or|and)\s+'?\d|--\s|;\s*(drop|delete|update)\b)",
    )
    .expect("SQL pattern must compile")
});

static MARKUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(<\s*script|</\s*script|javascript\s*:|\bon(error|load|click|mouseover)\s*=|<\s*iframe|<\s*img\b[^>]*\bon)")
        .expect("markup pattern must compile")
});

static TRAVERSAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.\./|\.\.\\|%2e%2e%2f|%2e%2e/|\.\.%2f|%2e%2e%5c)")
        .expect("traversal pattern must compile")
});

/// Inspects a decoded path and raw query string for threat patterns.
///
/// Pure function; the middleware is a thin wrapper around it. Returns the
/// first matching category, traversal checked before the others because it
/// is the cheapest to confirm.
pub fn inspect(path: &str, query: &str) -> Option<ThreatCategory> {
    // The path arrives percent-decoded; decode the query too so encoded
    // payloads land in the same patterns. Traversal patterns additionally
    // match the still-encoded forms in case of double encoding.
    let decoded_query = percent_decode_str(query).decode_utf8_lossy();

    for candidate in [path, query, decoded_query.as_ref()] {
        if TRAVERSAL_PATTERN.is_match(candidate) {
            return Some(ThreatCategory::PathTraversal);
        }
        if SQL_PATTERN.is_match(candidate) {
            return Some(ThreatCategory::SqlInjection);
        }
        if MARKUP_PATTERN.is_match(candidate) {
            return Some(ThreatCategory::MarkupInjection);
        }
    }

    None
}

/// WAF middleware layer
///
/// Rejects matching requests with 403 before any downstream stage runs.
pub async fn waf_layer(request: Request, next: Next) -> Response {
    let raw_path = request.uri().path();
    let path = percent_decode_str(raw_path).decode_utf8_lossy().to_string();
    let query = request.uri().query().unwrap_or("").to_string();

    if let Some(category) = inspect(&path, &query) {
        let client = super::client_addr(&request, "cf-connecting-ip");
        tracing::warn!(
            category = category.as_str(),
            client = %client,
            path = raw_path,
            "Request blocked by threat filter"
        );
        return ApiError::Forbidden.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_requests_pass() {
        assert_eq!(inspect("/tasks", ""), None);
        assert_eq!(inspect("/tasks/42", "status=done&page=2"), None);
        assert_eq!(inspect("/auth/login", ""), None);
        assert_eq!(inspect("/tags", "name=select-committee"), None);
    }

    #[test]
    fn test_sql_injection_detected() {
        assert_eq!(
            inspect("/tasks", "search=1' OR '1"),
            Some(ThreatCategory::SqlInjection)
        );
        assert_eq!(
            inspect("/tasks", "q=union select password from users"),
            Some(ThreatCategory::SqlInjection)
        );
        assert_eq!(
            inspect("/tasks", "q=1; drop table tasks"),
            Some(ThreatCategory::SqlInjection)
        );
    }

    #[test]
    fn test_markup_injection_detected() {
        assert_eq!(
            inspect("/tasks", "search=<script>alert(1)</script>"),
            Some(ThreatCategory::MarkupInjection)
        );
        assert_eq!(
            inspect("/tasks", "cb=javascript:void(0)"),
            Some(ThreatCategory::MarkupInjection)
        );
        assert_eq!(
            inspect("/tasks", "q=%3Cscript%3Ealert(1)%3C%2Fscript%3E"),
            Some(ThreatCategory::MarkupInjection)
        );
    }

    #[test]
    fn test_traversal_detected() {
        assert_eq!(
            inspect("/files/../../etc/passwd", ""),
            Some(ThreatCategory::PathTraversal)
        );
        assert_eq!(
            inspect("/files", "path=..%2f..%2fetc%2fpasswd"),
            Some(ThreatCategory::PathTraversal)
        );
        assert_eq!(
            inspect("/files", "path=%2e%2e%2f%2e%2e%2fetc"),
            Some(ThreatCategory::PathTraversal)
        );
    }

    #[test]
    fn test_categories_independent() {
        // A traversal in the path must not be reported as SQL just because
        // the query also mentions select
        assert_eq!(
            inspect("/a/../../b", "q=union select x from y"),
            Some(ThreatCategory::PathTraversal)
        );
    }
}
