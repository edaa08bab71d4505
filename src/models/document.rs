//! # 문서(Document) 모델 정의
//!
//! 문서는 사건(case)/의뢰인(client)에 속한 논리적인 파일 단위입니다.
//! 실제 파일 내용은 버전(`DocumentVersion`)이 가지며, 문서는 **현재 버전**의
//! 파일 참조와 버전 수를 함께 보관합니다.
//!
//! 문서는 생성되는 순간 버전 1을 가지므로, 버전이 0개인 문서는 존재하지 않습니다.

use serde::{Deserialize, Serialize};

/// 문서 진행 상태 — DB에는 소문자 TEXT로 저장됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Review,
    Final,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Review => "review",
            DocumentStatus::Final => "final",
        }
    }
}

/// 문서 엔티티 — DB의 `documents` 테이블 한 행에 대응합니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    pub name: String,
    /// 소속 사건 ID (선택)
    pub case_id: Option<String>,
    /// 소속 의뢰인 ID (선택)
    pub client_id: Option<String>,
    /// 분류 태그 (예: "contract", "pleading")
    pub category: Option<String>,
    pub status: DocumentStatus,
    /// 현재 버전 파일의 저장소 URL
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    /// 현재 남아 있는 버전 수 (삭제된 버전은 빠짐)
    pub version_count: i64,
    /// 지금까지 발급한 가장 큰 버전 번호. 삭제 후에도 줄어들지 않습니다.
    pub last_version_number: i64,
    pub is_starred: bool,
    /// 자동 저장되는 메모
    pub notes: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// 문서 목록 필터 — `GET /documents`의 쿼리 파라미터
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DocumentFilter {
    pub case_id: Option<String>,
    pub client_id: Option<String>,
    pub category: Option<String>,
    pub status: Option<DocumentStatus>,
    pub starred: Option<bool>,
    /// 문서 이름 부분 검색 (대소문자 무시)
    pub search: Option<String>,
    /// 1부터 시작하는 페이지 번호
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// 페이지네이션 정보
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}

/// `{ items, pagination }` 형태의 문서 목록 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub pagination: Pagination,
}

/// 문서 생성 메타데이터 — 파일 본문과 함께 `POST /documents`의 쿼리로 전달됩니다.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: Option<String>,
    pub case_id: Option<String>,
    pub client_id: Option<String>,
    pub category: Option<String>,
    pub status: Option<DocumentStatus>,
    /// 버전 1의 변경 메모
    pub change_note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    /// None = 필드 누락 (변경 안 함), Some(None) = null (연결 해제), Some(Some(id)) = 지정
    #[serde(default, deserialize_with = "double_option")]
    pub case_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub status: Option<DocumentStatus>,
    pub is_starred: Option<bool>,
}

/// 필드가 있으면(null 포함) `Some`으로 감싸 "누락"과 "null"을 구분합니다.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentNotes {
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(1, 20, 41).total_pages, 3);
        assert_eq!(Pagination::new(1, 20, 40).total_pages, 2);
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
    }

    #[test]
    fn update_request_distinguishes_null_from_missing() {
        let req: UpdateDocumentRequest =
            serde_json::from_str(r#"{ "case_id": null, "name": "Lease" }"#).unwrap();
        assert_eq!(req.case_id, Some(None));
        assert_eq!(req.client_id, None);
        assert_eq!(req.name.as_deref(), Some("Lease"));
    }
}
