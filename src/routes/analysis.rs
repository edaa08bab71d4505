//! # AI 비교 요약 / 문서 분석 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET  /api/v1/documents/{id}/comparisons?version1_id=&version2_id=` → 캐시된 요약 (없으면 404, 토큰 사용 없음)
//! - `POST /api/v1/documents/{id}/comparisons`                          → 요약 생성 (`force`면 캐시 무시 후 덮어쓰기)
//! - `GET  /api/v1/documents/{id}/analyses?version_id=&analysis_type=`  → 캐시된 분석
//! - `POST /api/v1/documents/{id}/analyses`                             → 분석 생성
//!
//! 토큰이 부족하면 HTTP 402 `insufficient_tokens`를 돌려줍니다.

use crate::{error::AppError, middleware::auth::AuthUser, models::*};
use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::documents::AppState;

pub async fn get_comparison(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ComparisonQuery>,
) -> Result<Json<AiSummary>, AppError> {
    let summary = state
        .analysis
        .get_cached_summary(&id, &query.version1_id, &query.version2_id)
        .await?;
    Ok(Json(summary))
}

pub async fn create_comparison(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CompareVersionsRequest>,
) -> Result<Json<AiSummary>, AppError> {
    let summary = state
        .analysis
        .compare_versions(&id, &req.version1_id, &req.version2_id, req.force)
        .await?;
    Ok(Json(summary))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<DocumentAnalysis>, AppError> {
    let analysis = state
        .analysis
        .get_cached_analysis(&id, query.version_id.as_deref(), query.analysis_type)
        .await?;
    Ok(Json(analysis))
}

pub async fn create_analysis(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<AnalyzeDocumentRequest>,
) -> Result<Json<DocumentAnalysis>, AppError> {
    let analysis = state
        .analysis
        .analyze_document(&id, req.version_id.as_deref(), req.analysis_type, req.force)
        .await?;
    Ok(Json(analysis))
}
