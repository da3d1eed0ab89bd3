//! API route handlers, one module per resource, plus the response and
//! visibility helpers every handler shares.

pub mod achievements;
pub mod analytics;
pub mod auth;
pub mod blogs;
pub mod contact;
pub mod experiences;
pub mod health;
pub mod projects;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error body returned by every failing handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Underlying error message, echoed outside production only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

/// Success body for delete/mark operations
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Generic 500 for unexpected persistence failures. The underlying message
/// is only exposed when ENVIRONMENT is not production.
pub fn internal_error(
    error: impl Into<String>,
    cause: &dyn std::fmt::Display,
) -> (StatusCode, Json<ErrorResponse>) {
    let details = if std::env::var("ENVIRONMENT").as_deref() == Ok("production") {
        None
    } else {
        Some(cause.to_string())
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: error.into(),
            details,
        }),
    )
}

/// 503 when no database pool has been initialized
pub fn db_unavailable() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new("Database not available")),
    )
}

/// Field deserializer for update payloads on nullable columns: an absent
/// field stays `None` (keep the stored value) while an explicit JSON `null`
/// becomes `Some(None)` (clear it). Without this, serde folds `null` into
/// the outer `Option` and the two cases are indistinguishable.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// The single publish-gating rule: public callers see published rows only,
/// an authenticated caller sees everything. List queries bind `is_admin`
/// into `WHERE ($1 OR published = true)`; get-by-id handlers call this on
/// the fetched row and 404 when it fails.
pub fn visible_to(is_admin: bool, published: bool) -> bool {
    is_admin || published
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_predicate() {
        assert!(visible_to(true, true));
        assert!(visible_to(true, false));
        assert!(visible_to(false, true));
        assert!(!visible_to(false, false));
    }

    #[test]
    fn test_error_response_omits_missing_details() {
        let json = serde_json::to_string(&ErrorResponse::new("nope")).unwrap();
        assert_eq!(json, r#"{"error":"nope"}"#);
    }

    #[test]
    fn test_double_option_separates_null_from_absent() {
        #[derive(serde::Deserialize)]
        struct Payload {
            #[serde(default, deserialize_with = "double_option")]
            field: Option<Option<String>>,
        }

        let absent: Payload = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.field, None);

        let null: Payload = serde_json::from_str(r#"{"field": null}"#).unwrap();
        assert_eq!(null.field, Some(None));

        let set: Payload = serde_json::from_str(r#"{"field": "x"}"#).unwrap();
        assert_eq!(set.field, Some(Some("x".to_string())));
    }
}
