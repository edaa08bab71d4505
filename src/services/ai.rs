//! # AI 요약 제공자(Provider)
//!
//! 버전 비교 요약과 단일 문서 분석을 생성하는 협력자 인터페이스입니다.
//!
//! 기본 구현인 `ExtractiveProvider`는 외부 모델 없이 원문에서 문장을 뽑아
//! 요약을 만듭니다. 같은 입력에는 항상 같은 결과를 돌려줍니다.
//!
//! 토큰 사용량은 대략 "문자 4개 = 토큰 1개"로 계산합니다.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{AnalysisType, DiffStats};
use crate::services::diff::{changed_lines, run_blocking, DIFF_TASK_TIMEOUT};

/// 두 버전 비교 요청 입력
#[derive(Debug, Clone)]
pub struct ComparisonInput {
    pub document_name: String,
    pub older_version_number: i64,
    pub newer_version_number: i64,
    pub older_text: String,
    pub newer_text: String,
    pub stats: DiffStats,
}

impl ComparisonInput {
    pub fn char_len(&self) -> usize {
        self.older_text.chars().count() + self.newer_text.chars().count()
    }
}

/// 단일 버전 분석 요청 입력
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub document_name: String,
    pub version_number: i64,
    pub text: String,
    pub analysis_type: AnalysisType,
}

/// 제공자가 돌려주는 생성 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub details: Option<String>,
    pub tokens_used: i64,
    pub model: String,
}

/// 문자 수 → 토큰 수 (올림)
pub fn tokens_for_chars(chars: usize) -> i64 {
    chars.div_ceil(4) as i64
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// 결과에 기록되는 모델 이름
    fn model(&self) -> &str;

    /// 호출 전에 잔액을 확인할 때 쓰는 예상 토큰 수
    fn estimate_tokens(&self, text_len: usize) -> i64 {
        tokens_for_chars(text_len)
    }

    async fn compare_versions(&self, input: &ComparisonInput) -> Result<Completion, AppError>;

    async fn analyze_document(&self, input: &AnalysisInput) -> Result<Completion, AppError>;
}

/// 원문 발췌 기반 요약기
#[derive(Debug, Clone, Default)]
pub struct ExtractiveProvider;

const EXTRACTIVE_MODEL: &str = "extractive-v1";
const MAX_CHANGED_LINES: usize = 10;
const MAX_SENTENCES: usize = 5;

const KEY_TERMS: &[&str] = &[
    "shall", "must", "agree", "term", "payment", "fee", "deadline", "party", "parties",
    "obligation", "effective", "date",
];

const RISK_TERMS: &[&str] = &[
    "liable", "liability", "indemn", "penalt", "terminat", "breach", "damages", "warrant",
    "default", "forfeit", "waive", "dispute", "arbitration", "confidential",
];

/// 문장 단위로 자릅니다. 줄바꿈도 경계로 봅니다.
fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().filter(|c| c.is_alphanumeric()).count() >= 3)
        .collect()
}

fn sentences_with<'a>(text: &'a str, terms: &[&str]) -> Vec<&'a str> {
    sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            terms.iter().any(|term| lower.contains(term))
        })
        .take(MAX_SENTENCES)
        .collect()
}

fn bullet_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ExtractiveProvider {
    pub fn new() -> Self {
        Self
    }

    fn finish(&self, content: String, details: Option<String>, input_chars: usize) -> Completion {
        let output_chars =
            content.chars().count() + details.as_deref().map_or(0, |d| d.chars().count());
        Completion {
            tokens_used: tokens_for_chars(input_chars + output_chars),
            content,
            details,
            model: EXTRACTIVE_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl AiProvider for ExtractiveProvider {
    fn model(&self) -> &str {
        EXTRACTIVE_MODEL
    }

    async fn compare_versions(&self, input: &ComparisonInput) -> Result<Completion, AppError> {
        let stats = input.stats;
        let total = stats.added + stats.removed + stats.unchanged;
        let changed_pct = if total == 0 {
            0
        } else {
            (stats.added + stats.removed) * 100 / total
        };

        let content = if stats.added == 0 && stats.removed == 0 {
            format!(
                "{}: version {} and version {} have identical content.",
                input.document_name, input.older_version_number, input.newer_version_number
            )
        } else {
            format!(
                "{}: version {} → {} added {} and removed {} characters ({}% of the text changed, {} unchanged).",
                input.document_name,
                input.older_version_number,
                input.newer_version_number,
                stats.added,
                stats.removed,
                changed_pct,
                stats.unchanged
            )
        };

        let (older_text, newer_text) = (input.older_text.clone(), input.newer_text.clone());
        let (added, removed) = run_blocking(DIFF_TASK_TIMEOUT, move || {
            changed_lines(&older_text, &newer_text, MAX_CHANGED_LINES)
        })
        .await?;
        let details = if added.is_empty() && removed.is_empty() {
            None
        } else {
            let lines: Vec<String> = removed
                .iter()
                .map(|line| format!("- {}", line))
                .chain(added.iter().map(|line| format!("+ {}", line)))
                .collect();
            Some(lines.join("\n"))
        };

        Ok(self.finish(content, details, input.char_len()))
    }

    async fn analyze_document(&self, input: &AnalysisInput) -> Result<Completion, AppError> {
        let text = input.text.as_str();

        let content = match input.analysis_type {
            AnalysisType::Overview => {
                let all = sentences(text);
                let words = text.split_whitespace().count();
                let lead: Vec<&str> = all.iter().copied().take(3).collect();
                let mut overview = format!(
                    "{} (version {}): {} words in {} sentences.",
                    input.document_name,
                    input.version_number,
                    words,
                    all.len()
                );
                if !lead.is_empty() {
                    overview.push('\n');
                    overview.push_str(&lead.join(". "));
                    overview.push('.');
                }
                overview
            }
            AnalysisType::KeyPoints => {
                let mut points = sentences_with(text, KEY_TERMS);
                if points.is_empty() {
                    points = sentences(text).into_iter().take(MAX_SENTENCES).collect();
                }
                if points.is_empty() {
                    "No key points could be extracted.".to_string()
                } else {
                    bullet_list(&points)
                }
            }
            AnalysisType::Risks => {
                let risks = sentences_with(text, RISK_TERMS);
                if risks.is_empty() {
                    "No risk indicators found.".to_string()
                } else {
                    bullet_list(&risks)
                }
            }
        };

        Ok(self.finish(content, None, text.chars().count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::diff::compute_diff;

    fn comparison(old: &str, new: &str) -> ComparisonInput {
        ComparisonInput {
            document_name: "Lease".to_string(),
            older_version_number: 1,
            newer_version_number: 2,
            older_text: old.to_string(),
            newer_text: new.to_string(),
            stats: compute_diff(old, new),
        }
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(tokens_for_chars(0), 0);
        assert_eq!(tokens_for_chars(1), 1);
        assert_eq!(tokens_for_chars(8), 2);
        assert_eq!(tokens_for_chars(9), 3);
    }

    #[tokio::test]
    async fn comparison_is_deterministic_and_lists_changed_lines() {
        let provider = ExtractiveProvider::new();
        let input = comparison("Rent is 100.\nTerm is 1 year.\n", "Rent is 120.\nTerm is 1 year.\n");

        let first = provider.compare_versions(&input).await.unwrap();
        let second = provider.compare_versions(&input).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.model, "extractive-v1");
        assert!(first.content.contains("version 1 → 2"));
        let details = first.details.unwrap();
        assert!(details.contains("- Rent is 100."));
        assert!(details.contains("+ Rent is 120."));
        assert!(first.tokens_used >= provider.estimate_tokens(input.char_len()));
    }

    #[tokio::test]
    async fn risks_pick_out_liability_language() {
        let provider = ExtractiveProvider::new();
        let input = AnalysisInput {
            document_name: "NDA".to_string(),
            version_number: 3,
            text: "The parties meet monthly. The recipient is liable for any breach of this agreement. Lunch is provided."
                .to_string(),
            analysis_type: AnalysisType::Risks,
        };

        let result = provider.analyze_document(&input).await.unwrap();
        assert_eq!(
            result.content,
            "- The recipient is liable for any breach of this agreement"
        );
    }
}
