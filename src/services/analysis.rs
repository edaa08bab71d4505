//! # AI 요약/분석 서비스
//!
//! ## 요약 생성 흐름
//! ```text
//! generate_summary(doc, a, b)
//!   1. 두 버전을 정규 순서로 정렬 (낮은 번호 먼저)
//!   2. 예상 토큰으로 잔액 사전 확인        → 부족하면 InsufficientTokens (제공자 호출 없음)
//!   3. 제공자 호출 (시간 제한)             → 실패/시간 초과는 Network
//!   4. 실제 사용량만큼 차감               → 원장이 거절하면 InsufficientTokens
//!   5. 캐시 행 저장 (같은 키면 덮어쓰기)    → 실패하면 차감한 토큰을 돌려줌
//! ```
//!
//! 캐시 조회(`get_cached_summary`, `get_cached_analysis`)는 제공자와 잔액을 건드리지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::services::ai::{AiProvider, AnalysisInput, ComparisonInput, Completion};
use crate::services::balance::TokenBalance;
use crate::services::versioning::VersionStore;

#[derive(Clone)]
pub struct AnalysisService {
    versions: VersionStore,
    provider: Arc<dyn AiProvider>,
    balance: Arc<dyn TokenBalance>,
    timeout: Duration,
}

impl AnalysisService {
    pub fn new(
        versions: VersionStore,
        provider: Arc<dyn AiProvider>,
        balance: Arc<dyn TokenBalance>,
        timeout: Duration,
    ) -> Self {
        Self {
            versions,
            provider,
            balance,
            timeout,
        }
    }

    pub fn balance(&self) -> &Arc<dyn TokenBalance> {
        &self.balance
    }

    /// 잔액이 예상 사용량보다 적으면 제공자를 호출하기 전에 거절합니다.
    async fn precheck(&self, estimate: i64) -> Result<(), AppError> {
        let available = self.balance.get_balance().await?.total_available;
        if available < estimate {
            return Err(AppError::InsufficientTokens {
                required: estimate,
                available,
            });
        }
        Ok(())
    }

    async fn with_timeout<F>(&self, call: F) -> Result<Completion, AppError>
    where
        F: std::future::Future<Output = Result<Completion, AppError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                AppError::Network(format!(
                    "AI provider did not respond within {}s",
                    self.timeout.as_secs()
                ))
            })?
    }

    /// 저장에 실패하면 이미 차감한 토큰을 돌려줍니다.
    async fn refund_after<T>(
        &self,
        stored: Result<T, AppError>,
        tokens: i64,
    ) -> Result<T, AppError> {
        if let Err(e) = &stored {
            tracing::warn!("Failed to store AI result, refunding {} tokens: {}", tokens, e);
            if let Err(refund_err) = self.balance.refund(tokens, "refund: result not stored").await {
                tracing::error!("Token refund failed: {}", refund_err);
            }
        }
        stored
    }

    async fn resolve_version(
        &self,
        document_id: &str,
        version_id: Option<&str>,
    ) -> Result<DocumentVersion, AppError> {
        let version = match version_id {
            Some(id) => db::get_document_version(self.versions.pool(), document_id, id).await?,
            None => db::get_current_version(self.versions.pool(), document_id).await?,
        };
        version.ok_or(AppError::NotFound)
    }

    // ============================
    // 버전 비교 요약
    // ============================

    /// 캐시된 비교 요약. 없으면 `NotFound`. 토큰을 쓰지 않습니다.
    pub async fn get_cached_summary(
        &self,
        document_id: &str,
        version_a: &str,
        version_b: &str,
    ) -> Result<AiSummary, AppError> {
        let (older, newer, _) = self
            .versions
            .ordered_pair(document_id, version_a, version_b)
            .await?;

        db::get_comparison(self.versions.pool(), document_id, &older.id, &newer.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 비교 요약을 새로 생성해 캐시에 저장합니다. 같은 키의 기존 요약은 덮어씁니다.
    pub async fn generate_summary(
        &self,
        document_id: &str,
        version_a: &str,
        version_b: &str,
    ) -> Result<AiSummary, AppError> {
        let document = self.versions.get_document(document_id).await?;
        let (older, newer, _) = self
            .versions
            .ordered_pair(document_id, version_a, version_b)
            .await?;

        let diff = self.versions.diff(document_id, &older.id, &newer.id).await?;
        let input = ComparisonInput {
            document_name: document.name,
            older_version_number: older.version_number,
            newer_version_number: newer.version_number,
            older_text: self.versions.read_version_text(&older).await?,
            newer_text: self.versions.read_version_text(&newer).await?,
            stats: diff.stats,
        };

        self.precheck(self.provider.estimate_tokens(input.char_len()))
            .await?;
        let completion = self
            .with_timeout(self.provider.compare_versions(&input))
            .await?;

        self.balance
            .spend(completion.tokens_used, "version comparison", Some(document_id))
            .await?;

        let stored = db::upsert_comparison(
            self.versions.pool(),
            &db::NewComparison {
                document_id,
                older_version_id: &older.id,
                newer_version_id: &newer.id,
                summary: &completion.content,
                details: completion.details.as_deref(),
                tokens_used: completion.tokens_used,
                model: &completion.model,
            },
        )
        .await;
        let summary = self.refund_after(stored, completion.tokens_used).await?;

        tracing::info!(
            document_id = %document_id,
            older = older.version_number,
            newer = newer.version_number,
            tokens = completion.tokens_used,
            "Generated version comparison"
        );
        Ok(summary)
    }

    /// 캐시가 있으면 그대로 돌려주고, 없거나 `force`면 새로 생성합니다.
    pub async fn compare_versions(
        &self,
        document_id: &str,
        version_a: &str,
        version_b: &str,
        force: bool,
    ) -> Result<AiSummary, AppError> {
        if !force {
            match self.get_cached_summary(document_id, version_a, version_b).await {
                Ok(summary) => {
                    tracing::debug!(document_id = %document_id, "Comparison cache hit");
                    return Ok(summary);
                }
                Err(AppError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        self.generate_summary(document_id, version_a, version_b).await
    }

    // ============================
    // 단일 문서 분석
    // ============================

    /// 캐시된 분석. `version_id`가 없으면 현재 버전 기준입니다.
    pub async fn get_cached_analysis(
        &self,
        document_id: &str,
        version_id: Option<&str>,
        analysis_type: AnalysisType,
    ) -> Result<DocumentAnalysis, AppError> {
        let version = self.resolve_version(document_id, version_id).await?;
        db::get_analysis(self.versions.pool(), document_id, &version.id, analysis_type)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn analyze_document(
        &self,
        document_id: &str,
        version_id: Option<&str>,
        analysis_type: AnalysisType,
        force: bool,
    ) -> Result<DocumentAnalysis, AppError> {
        let document = self.versions.get_document(document_id).await?;
        let version = self.resolve_version(document_id, version_id).await?;

        if !force {
            if let Some(cached) =
                db::get_analysis(self.versions.pool(), document_id, &version.id, analysis_type)
                    .await?
            {
                tracing::debug!(document_id = %document_id, %analysis_type, "Analysis cache hit");
                return Ok(cached);
            }
        }

        let input = AnalysisInput {
            document_name: document.name,
            version_number: version.version_number,
            text: self.versions.read_version_text(&version).await?,
            analysis_type,
        };

        self.precheck(self.provider.estimate_tokens(input.text.chars().count()))
            .await?;
        let completion = self
            .with_timeout(self.provider.analyze_document(&input))
            .await?;

        self.balance
            .spend(
                completion.tokens_used,
                &format!("document analysis ({})", analysis_type),
                Some(document_id),
            )
            .await?;

        let stored = db::upsert_analysis(
            self.versions.pool(),
            document_id,
            &version.id,
            analysis_type,
            &completion.content,
            completion.tokens_used,
            &completion.model,
        )
        .await;
        let analysis = self.refund_after(stored, completion.tokens_used).await?;

        tracing::info!(
            document_id = %document_id,
            version_number = version.version_number,
            %analysis_type,
            tokens = completion.tokens_used,
            "Generated document analysis"
        );
        Ok(analysis)
    }
}

// ============================
// 분석 버튼 상태
// ============================

/// 실패 원인. 토큰 부족은 재시도가 아니라 충전 안내로 이어지므로 따로 구분합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisFailure {
    InsufficientTokens { required: i64, available: i64 },
    Failed(String),
}

impl AnalysisFailure {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::InsufficientTokens {
                required,
                available,
            } => AnalysisFailure::InsufficientTokens {
                required: *required,
                available: *available,
            },
            other => AnalysisFailure::Failed(other.to_string()),
        }
    }

    /// 사용자에게 보여줄 문구
    pub fn user_message(&self) -> String {
        match self {
            AnalysisFailure::InsufficientTokens {
                required,
                available,
            } => format!(
                "Not enough AI tokens: this request needs about {} but only {} remain. Upgrade your plan to continue.",
                required, available
            ),
            AnalysisFailure::Failed(_) => {
                "The analysis could not be generated. Please try again.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState<T> {
    Idle,
    Generating,
    Success(T),
    Error(AnalysisFailure),
}

/// 진행 중인 요청을 구분하는 번호
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// `Idle → Generating → Success | Error` 상태 기계
///
/// 자동 재시도는 없습니다. `Success`/`Error`에서 다시 `start()`하면 새로고침입니다.
/// `reset()` 이후에 도착한 이전 요청의 결과는 버려집니다.
#[derive(Debug)]
pub struct AnalysisTracker<T> {
    state: AnalysisState<T>,
    ticket: u64,
}

impl<T> Default for AnalysisTracker<T> {
    fn default() -> Self {
        Self {
            state: AnalysisState::Idle,
            ticket: 0,
        }
    }
}

impl<T> AnalysisTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnalysisState<T> {
        &self.state
    }

    /// 생성을 시작합니다. 이미 생성 중이면 None.
    pub fn start(&mut self) -> Option<Ticket> {
        if matches!(self.state, AnalysisState::Generating) {
            return None;
        }
        self.ticket += 1;
        self.state = AnalysisState::Generating;
        Some(Ticket(self.ticket))
    }

    /// 결과를 반영합니다. 오래된 요청의 결과면 false를 돌려주고 무시합니다.
    pub fn finish(&mut self, ticket: Ticket, result: Result<T, AppError>) -> bool {
        if ticket.0 != self.ticket || !matches!(self.state, AnalysisState::Generating) {
            return false;
        }
        self.state = match result {
            Ok(value) => AnalysisState::Success(value),
            Err(e) => AnalysisState::Error(AnalysisFailure::from_error(&e)),
        };
        true
    }

    /// 대상이 바뀌었을 때 호출합니다. 진행 중인 요청은 무효가 됩니다.
    pub fn reset(&mut self) {
        self.ticket += 1;
        self.state = AnalysisState::Idle;
    }
}
