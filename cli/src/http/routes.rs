//! HTTP路由handlers

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use prorab_core::api::{RecommendRequest, RecommendationResponse};

use crate::http::{
    models::{HealthResponse, HttpServerError, InvalidateResponse},
    state::AppState,
    validation::validate_recommend_request,
};

/// 创建所有路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/recommendations", post(recommendations_handler))
        .route("/api/v1/prompts/invalidate", post(invalidate_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/shutdown", post(shutdown_handler))
        .with_state(state)
}

/// POST /api/v1/recommendations - 推荐入口
async fn recommendations_handler(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendationResponse>, HttpServerError> {
    // 更新统计
    {
        let mut stats = state.stats.write().unwrap();
        stats.increment_request("/api/v1/recommendations");
    }

    validate_recommend_request(&req)?;

    // 机会式合并动态密钥（刷新窗口过期时才真正拉取）
    if let Some(keys) = state.keys.as_ref() {
        state.ctx.refresh_dynamic_keys(keys).await;
    }

    let response = state.engine.recommend(req).await;
    if !response.success {
        let mut stats = state.stats.write().unwrap();
        stats.increment_error();
    }
    Ok(Json(response))
}

/// POST /api/v1/prompts/invalidate - 后台保存提示词/设置后调用
async fn invalidate_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    {
        let mut stats = state.stats.write().unwrap();
        stats.increment_request("/api/v1/prompts/invalidate");
    }

    state.engine.prompts().invalidate();
    state.engine.settings().invalidate();
    state.engine.clear_cache();

    tracing::info!(target: "prorab.http", "prompt/settings caches invalidated");
    Json(InvalidateResponse {
        success: true,
        message: "caches invalidated".to_string(),
    })
}

/// GET /health - 健康检查
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().unwrap();

    Json(HealthResponse {
        status: "healthy".into(),
        session_id: state.session_id.clone(),
        uptime_seconds: stats.uptime_seconds(),
        requests_handled: stats.requests_total,
        timestamp: Local::now().to_rfc3339(),
        key_pool: state.ctx.pool().snapshot(),
    })
}

/// POST /api/v1/shutdown - 优雅关闭
async fn shutdown_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let _ = state.shutdown_tx.send(());

    Json(serde_json::json!({
        "success": true,
        "message": "shutting down",
    }))
}
