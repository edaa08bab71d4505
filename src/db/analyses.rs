//! # AI 요약/분석 캐시 쿼리 모듈
//!
//! - `version_comparisons`: (이전 버전, 이후 버전) 쌍마다 요약 하나
//! - `document_analyses`: (버전, 분석 종류)마다 결과 하나
//!
//! 같은 키로 다시 생성하면 `ON CONFLICT ... DO UPDATE`로 기존 행을 덮어씁니다.
//! 행의 `id`와 `created_at`은 유지되고 `updated_at`만 바뀝니다.

use crate::error::AppError;
use crate::models::{AiSummary, AnalysisType, DocumentAnalysis};
use sqlx::SqlitePool;

const COMPARISON_COLUMNS: &str = "id, document_id, older_version_id, newer_version_id, summary, \
     details, tokens_used, model, created_at, updated_at";

const ANALYSIS_COLUMNS: &str = "id, document_id, version_id, analysis_type, content, tokens_used, \
     model, created_at, updated_at";

/// 캐시된 비교 요약을 조회합니다. 버전 ID는 정규 순서(older, newer)여야 합니다.
pub async fn get_comparison(
    pool: &SqlitePool,
    document_id: &str,
    older_version_id: &str,
    newer_version_id: &str,
) -> Result<Option<AiSummary>, AppError> {
    let summary = sqlx::query_as::<_, AiSummary>(&format!(
        r#"
        SELECT {COMPARISON_COLUMNS}
        FROM version_comparisons
        WHERE document_id = ? AND older_version_id = ? AND newer_version_id = ?
        "#
    ))
    .bind(document_id)
    .bind(older_version_id)
    .bind(newer_version_id)
    .fetch_optional(pool)
    .await?;

    Ok(summary)
}

/// 비교 요약 저장에 필요한 값
pub struct NewComparison<'a> {
    pub document_id: &'a str,
    pub older_version_id: &'a str,
    pub newer_version_id: &'a str,
    pub summary: &'a str,
    pub details: Option<&'a str>,
    pub tokens_used: i64,
    pub model: &'a str,
}

/// 비교 요약을 저장하거나 같은 키의 기존 요약을 덮어씁니다.
pub async fn upsert_comparison(
    pool: &SqlitePool,
    new: &NewComparison<'_>,
) -> Result<AiSummary, AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    sqlx::query(
        r#"
        INSERT INTO version_comparisons
            (id, document_id, older_version_id, newer_version_id, summary, details, tokens_used, model)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (older_version_id, newer_version_id) DO UPDATE SET
            summary = excluded.summary,
            details = excluded.details,
            tokens_used = excluded.tokens_used,
            model = excluded.model,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        "#,
    )
    .bind(&id)
    .bind(new.document_id)
    .bind(new.older_version_id)
    .bind(new.newer_version_id)
    .bind(new.summary)
    .bind(new.details)
    .bind(new.tokens_used)
    .bind(new.model)
    .execute(pool)
    .await?;

    get_comparison(pool, new.document_id, new.older_version_id, new.newer_version_id)
        .await?
        .ok_or(AppError::Internal("Failed to retrieve stored comparison".to_string()))
}

pub async fn get_analysis(
    pool: &SqlitePool,
    document_id: &str,
    version_id: &str,
    analysis_type: AnalysisType,
) -> Result<Option<DocumentAnalysis>, AppError> {
    let analysis = sqlx::query_as::<_, DocumentAnalysis>(&format!(
        r#"
        SELECT {ANALYSIS_COLUMNS}
        FROM document_analyses
        WHERE document_id = ? AND version_id = ? AND analysis_type = ?
        "#
    ))
    .bind(document_id)
    .bind(version_id)
    .bind(analysis_type.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(analysis)
}

/// 단일 버전 분석 결과를 저장하거나 덮어씁니다.
pub async fn upsert_analysis(
    pool: &SqlitePool,
    document_id: &str,
    version_id: &str,
    analysis_type: AnalysisType,
    content: &str,
    tokens_used: i64,
    model: &str,
) -> Result<DocumentAnalysis, AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    sqlx::query(
        r#"
        INSERT INTO document_analyses
            (id, document_id, version_id, analysis_type, content, tokens_used, model)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (version_id, analysis_type) DO UPDATE SET
            content = excluded.content,
            tokens_used = excluded.tokens_used,
            model = excluded.model,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        "#,
    )
    .bind(&id)
    .bind(document_id)
    .bind(version_id)
    .bind(analysis_type.as_str())
    .bind(content)
    .bind(tokens_used)
    .bind(model)
    .execute(pool)
    .await?;

    get_analysis(pool, document_id, version_id, analysis_type)
        .await?
        .ok_or(AppError::Internal("Failed to retrieve stored analysis".to_string()))
}

/// 문서의 비교 요약 행 수 (덮어쓰기 검증용)
pub async fn count_comparisons(pool: &SqlitePool, document_id: &str) -> Result<i64, AppError> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM version_comparisons WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
