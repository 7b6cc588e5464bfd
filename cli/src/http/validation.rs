//! 基础请求验证逻辑

use super::models::HttpServerError;

const MAX_QUERY_CHARS: usize = 2000;
const MAX_HISTORY_MESSAGES: usize = 50;

/// 验证推荐请求的基础字段
pub fn validate_recommend_request(
    req: &prorab_core::api::RecommendRequest,
) -> Result<(), HttpServerError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(HttpServerError::InvalidRequest(
            "Query cannot be empty".to_string(),
        ));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(HttpServerError::InvalidRequest(format!(
            "Query too long ({} chars, max {})",
            query.chars().count(),
            MAX_QUERY_CHARS
        )));
    }

    if req.messages.len() > MAX_HISTORY_MESSAGES {
        return Err(HttpServerError::InvalidRequest(format!(
            "Too many history messages ({}, max {})",
            req.messages.len(),
            MAX_HISTORY_MESSAGES
        )));
    }

    if let Some(max) = req.max_results {
        if max == 0 || max > 20 {
            return Err(HttpServerError::InvalidRequest(format!(
                "maxResults out of range ({max}, allowed 1..=20)"
            )));
        }
    }

    Ok(())
}
