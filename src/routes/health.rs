//! # 헬스체크(Health Check) 핸들러
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok", "database": "ok" }`
//!
//! 인증 없이 호출할 수 있습니다. DB에 `SELECT 1`을 보내 연결 상태도 함께 알려줍니다.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::documents::AppState;

/// `GET /health` — DB가 응답하지 않으면 HTTP 503
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(e) => {
            tracing::error!("Health check database ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unavailable" })),
            )
        }
    }
}
