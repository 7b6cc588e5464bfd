//! HTTP API数据模型

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prorab_core::api::PoolSnapshot;
use serde::Serialize;

// ============= Health =============

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub session_id: String,
    pub uptime_seconds: u64,
    pub requests_handled: u64,
    pub timestamp: String,
    pub key_pool: PoolSnapshot,
}

// ============= Admin =============

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub message: String,
}

// ============= Errors =============

#[derive(Debug)]
pub enum HttpServerError {
    InvalidRequest(String),
    Upstream(String),
    Timeout,
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            Self::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "Request timeout".to_string(),
            ),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
            "error_code": error_code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prorab_core::api::RecommendRequest;

    #[test]
    fn test_recommend_request_deserialize() {
        let json = r#"{"query":"drill","maxResults":3,"context":{"categoryId":"c1"}}"#;
        let req: RecommendRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.query, "drill");
        assert_eq!(req.max_results, Some(3));
        assert_eq!(
            req.context.unwrap().category_id.as_deref(),
            Some("c1")
        );
    }

    #[test]
    fn test_recommend_request_defaults() {
        let json = r#"{"query":"drill"}"#;
        let req: RecommendRequest = serde_json::from_str(json).unwrap();
        assert!(req.messages.is_empty());
        assert!(req.max_results.is_none());
        assert!(req.context.is_none());
    }
}
