//! # 버전 비교(diff) 및 AI 분석 모델
//!
//! - `DiffResult`: 두 버전 사이의 문자 단위 추가/삭제/유지 통계
//! - `AiSummary`: 두 버전 비교에 대한 AI 요약 (캐시 항목)
//! - `DocumentAnalysis`: 한 버전에 대한 AI 분석 (캐시 항목)
//!
//! 캐시 키는 항상 **낮은 버전 번호가 먼저** 오는 정규 순서를 따릅니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 문자 단위 변경 통계 (유니코드 스칼라 값 기준)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: u64,
    pub removed: u64,
    pub unchanged: u64,
}

/// 두 버전의 diff 결과. `older`/`newer`는 정규 순서입니다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffResult {
    pub document_id: String,
    pub older_version_id: String,
    pub older_version_number: i64,
    pub newer_version_id: String,
    pub newer_version_number: i64,
    /// older → newer 방향의 통계
    pub stats: DiffStats,
    /// 호출자가 (newer, older) 순서로 요청했는지 여부
    pub swapped: bool,
}

/// 버전 비교 AI 요약 — `version_comparisons` 테이블 한 행
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
pub struct AiSummary {
    pub id: String,
    pub document_id: String,
    pub older_version_id: String,
    pub newer_version_id: String,
    pub summary: String,
    pub details: Option<String>,
    pub tokens_used: i64,
    pub model: String,
    pub created_at: String,
    pub updated_at: String,
}

/// 단일 문서 분석 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Overview,
    KeyPoints,
    Risks,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Overview => "overview",
            AnalysisType::KeyPoints => "key_points",
            AnalysisType::Risks => "risks",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 단일 버전 분석 결과 — `document_analyses` 테이블 한 행
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
pub struct DocumentAnalysis {
    pub id: String,
    pub document_id: String,
    pub version_id: String,
    pub analysis_type: String,
    pub content: String,
    pub tokens_used: i64,
    pub model: String,
    pub created_at: String,
    pub updated_at: String,
}

/// `POST /documents/:id/comparisons` 요청 본문
#[derive(Debug, Deserialize)]
pub struct CompareVersionsRequest {
    pub version1_id: String,
    pub version2_id: String,
    /// true면 캐시를 무시하고 다시 생성해 덮어씁니다.
    #[serde(default)]
    pub force: bool,
}

/// `GET /documents/:id/comparisons` 쿼리
#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub version1_id: String,
    pub version2_id: String,
}

/// `POST /documents/:id/analyses` 요청 본문
#[derive(Debug, Deserialize)]
pub struct AnalyzeDocumentRequest {
    /// 생략하면 현재 버전을 분석합니다.
    pub version_id: Option<String>,
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub force: bool,
}

/// `GET /documents/:id/analyses` 쿼리
#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub version_id: Option<String>,
    pub analysis_type: AnalysisType,
}
