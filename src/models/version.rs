use serde::{Deserialize, Serialize};

/// 문서의 한 시점 스냅샷. 생성 후 파일 참조는 바뀌지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
pub struct DocumentVersion {
    pub id: String,
    pub document_id: String,
    /// 문서별로 1부터 단조 증가. 삭제되어도 재사용되지 않습니다.
    pub version_number: i64,
    pub author_id: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub original_file_name: String,
    /// 파일 내용의 SHA-256 (hex)
    pub checksum: String,
    pub change_note: String,
    pub is_current: bool,
    pub approved: bool,
    pub created_at: String,
}

/// 업로드 완료 후 저장소가 돌려주는 영속 참조
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub url: String,
    pub size: i64,
    pub mime_type: String,
    pub original_file_name: String,
    pub checksum: String,
}

impl FileRef {
    /// 버전이 가리키는 파일 참조를 복원합니다 (버전 복원 시 사용).
    pub fn from_version(version: &DocumentVersion) -> Self {
        Self {
            url: version.file_url.clone(),
            size: version.file_size,
            mime_type: version.mime_type.clone(),
            original_file_name: version.original_file_name.clone(),
            checksum: version.checksum.clone(),
        }
    }
}

/// 버전 목록 조회 범위. `offset`부터 다시 읽으면 같은 순서로 이어집니다.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct VersionListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionPage {
    pub versions: Vec<DocumentVersion>,
    pub total: i64,
    pub offset: u32,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

/// 새 버전 업로드 시 쿼리로 받는 변경 메모
#[derive(Debug, Default, Deserialize)]
pub struct CreateVersionQuery {
    pub change_note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiffQuery {
    pub version_a: String,
    pub version_b: String,
}
