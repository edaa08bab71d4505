//! # 버전 저장소(Version Store) 서비스
//!
//! 문서의 버전 수명주기를 담당하는 서비스 객체입니다.
//!
//! ```text
//! 문서 없음 ──create_document()──▶ 버전 있음(current = 1)
//!                                     │ create_version() / restore_version() → current = N + 1
//!                                     │ delete_version(현재 아님) → 번호 빈칸 유지
//!                                     └ delete_version(현재) → InvalidOperation
//! ```
//!
//! - 업로드가 성공한 뒤에만 버전 레코드를 만듭니다.
//! - 버전 번호는 DB 카운터가 발급하고, 같은 문서에 대한 생성은 문서별 잠금으로 직렬화됩니다.
//! - 전역 상태 없이 `AppState`에 담아 핸들러에 전달합니다. clone은 내부 `Arc`를 공유합니다.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::services::diff::{compute_diff, run_blocking, DiffCache, DIFF_TASK_TIMEOUT};
use crate::services::upload::{UploadFile, UploadPipeline};

/// 문서 이름 최대 길이 (문자 수)
pub const MAX_NAME_LEN: usize = 255;

/// 앞뒤 공백을 제거한 이름을 돌려줍니다. 비었거나 너무 길면 `Validation`.
pub fn validate_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("document name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "document name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

type DocumentLocks = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

#[derive(Clone)]
pub struct VersionStore {
    pool: SqlitePool,
    uploads: UploadPipeline,
    diffs: DiffCache,
    locks: DocumentLocks,
}

impl VersionStore {
    pub fn new(pool: SqlitePool, uploads: UploadPipeline) -> Self {
        Self {
            pool,
            uploads,
            diffs: DiffCache::new(),
            locks: Arc::default(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.uploads
    }

    pub fn diff_cache(&self) -> &DiffCache {
        &self.diffs
    }

    /// 문서별 비동기 잠금을 잡습니다. 버전 번호 발급과 현재 버전 변경을 직렬화합니다.
    async fn lock_document(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(document_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn forget_lock(&self, document_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(document_id);
    }

    async fn require_document(&self, document_id: &str) -> Result<Document, AppError> {
        db::get_document(&self.pool, document_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn require_version(
        &self,
        document_id: &str,
        version_id: &str,
    ) -> Result<DocumentVersion, AppError> {
        db::get_document_version(&self.pool, document_id, version_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    // ============================
    // 문서
    // ============================

    pub async fn list_documents(&self, filter: &DocumentFilter) -> Result<DocumentPage, AppError> {
        db::list_documents(&self.pool, filter).await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Document, AppError> {
        self.require_document(document_id).await
    }

    /// 파일을 올린 뒤 문서와 버전 1을 함께 만듭니다.
    ///
    /// 이름이 없으면 업로드 파일명을 이름으로 씁니다.
    /// 검증에 실패하면 저장소를 호출하지 않습니다.
    pub async fn create_document(
        &self,
        req: &CreateDocumentRequest,
        file: &UploadFile,
        author_id: &str,
    ) -> Result<(Document, DocumentVersion), AppError> {
        let name = validate_name(req.name.as_deref().unwrap_or_else(|| file.base_name()))?;
        let file_ref = self.uploads.upload(file).await?;

        match db::create_document(&self.pool, req, &name, author_id, &file_ref).await {
            Ok((document, version)) => {
                tracing::info!(
                    document_id = %document.id,
                    version_id = %version.id,
                    "Created document '{}'",
                    document.name
                );
                Ok((document, version))
            }
            Err(e) => {
                self.uploads.discard(&file_ref).await;
                Err(e)
            }
        }
    }

    pub async fn update_document(
        &self,
        document_id: &str,
        req: UpdateDocumentRequest,
    ) -> Result<Document, AppError> {
        let req = UpdateDocumentRequest {
            name: req.name.as_deref().map(validate_name).transpose()?,
            ..req
        };

        db::update_document(&self.pool, document_id, &req)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn update_notes(&self, document_id: &str, notes: &str) -> Result<(), AppError> {
        if db::update_notes(&self.pool, document_id, notes).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// 문서와 모든 버전, 비교 요약, 분석을 삭제합니다.
    ///
    /// 저장된 파일은 삭제가 커밋된 뒤 정리하며, 정리 실패는 경고만 남깁니다.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), AppError> {
        let urls = {
            let _guard = self.lock_document(document_id).await;
            let urls = db::list_file_urls(&self.pool, document_id).await?;
            if !db::delete_document(&self.pool, document_id).await? {
                return Err(AppError::NotFound);
            }
            urls
        };

        self.forget_lock(document_id);
        self.diffs.invalidate_document(document_id);

        for url in &urls {
            if let Err(e) = self.uploads.storage().delete(url).await {
                tracing::warn!(url = %url, "Failed to remove stored file: {}", e);
            }
        }

        tracing::info!(document_id = %document_id, files = urls.len(), "Deleted document");
        Ok(())
    }

    // ============================
    // 버전
    // ============================

    /// 새 파일을 올리고 현재 버전으로 지정합니다.
    ///
    /// 업로드가 실패하면 버전 레코드는 생기지 않습니다.
    /// 업로드 후 버전 생성이 실패하면 올린 파일을 지웁니다.
    pub async fn create_version(
        &self,
        document_id: &str,
        file: &UploadFile,
        author_id: &str,
        change_note: Option<&str>,
    ) -> Result<DocumentVersion, AppError> {
        self.require_document(document_id).await?;
        let file_ref = self.uploads.upload(file).await?;

        let created = {
            let _guard = self.lock_document(document_id).await;
            db::create_version(
                &self.pool,
                document_id,
                author_id,
                &file_ref,
                change_note.unwrap_or(""),
            )
            .await
        };

        match created {
            Ok(Some(version)) => {
                tracing::info!(
                    document_id = %document_id,
                    version_id = %version.id,
                    version_number = version.version_number,
                    "Created version"
                );
                Ok(version)
            }
            Ok(None) => {
                // 업로드 중에 문서가 삭제됨
                self.uploads.discard(&file_ref).await;
                Err(AppError::NotFound)
            }
            Err(e) => {
                self.uploads.discard(&file_ref).await;
                Err(e)
            }
        }
    }

    /// 버전 목록 (최신순). 같은 `offset`으로 다시 요청하면 같은 위치부터 이어집니다.
    pub async fn list_versions(
        &self,
        document_id: &str,
        query: VersionListQuery,
    ) -> Result<VersionPage, AppError> {
        self.require_document(document_id).await?;
        let offset = query.offset.unwrap_or(0);

        let versions = db::list_versions(&self.pool, document_id, query.limit, offset).await?;
        let total = db::count_versions(&self.pool, document_id).await?;

        Ok(VersionPage {
            versions,
            total,
            offset,
            limit: query.limit,
        })
    }

    pub async fn get_version(&self, version_id: &str) -> Result<DocumentVersion, AppError> {
        db::get_version(&self.pool, version_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 버전 메타데이터와 파일 바이트
    pub async fn read_version_file(
        &self,
        version_id: &str,
    ) -> Result<(DocumentVersion, Vec<u8>), AppError> {
        let version = self.get_version(version_id).await?;
        let bytes = self.uploads.storage().get(&version.file_url).await?;
        Ok((version, bytes))
    }

    /// 버전 내용을 텍스트로 읽습니다. UTF-8이 아닌 바이트는 대체 문자로 바뀝니다.
    pub async fn read_version_text(&self, version: &DocumentVersion) -> Result<String, AppError> {
        let bytes = self.uploads.storage().get(&version.file_url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 과거 버전의 파일을 가리키는 새 버전을 만듭니다. 기존 버전은 그대로 남습니다.
    ///
    /// # 에러
    /// - `NotFound`: 문서에 해당 버전이 없음
    /// - `InvalidOperation`: 이미 현재 버전임
    pub async fn restore_version(
        &self,
        document_id: &str,
        version_id: &str,
        author_id: &str,
    ) -> Result<DocumentVersion, AppError> {
        let _guard = self.lock_document(document_id).await;

        let target = self.require_version(document_id, version_id).await?;
        if target.is_current {
            return Err(AppError::InvalidOperation(format!(
                "version {} is already the current version",
                target.version_number
            )));
        }

        let note = format!("Restored from version {}", target.version_number);
        let version = db::create_version(
            &self.pool,
            document_id,
            author_id,
            &FileRef::from_version(&target),
            &note,
        )
        .await?
        .ok_or(AppError::NotFound)?;

        tracing::info!(
            document_id = %document_id,
            restored_from = target.version_number,
            version_number = version.version_number,
            "Restored version"
        );
        Ok(version)
    }

    /// 현재 버전이 아닌 버전을 삭제합니다. 남은 번호는 바뀌지 않습니다.
    ///
    /// 파일은 복원된 버전과 공유될 수 있어 지우지 않습니다.
    pub async fn delete_version(
        &self,
        document_id: &str,
        version_id: &str,
    ) -> Result<DocumentVersion, AppError> {
        let deleted = {
            let _guard = self.lock_document(document_id).await;
            db::delete_version(&self.pool, document_id, version_id).await?
        };

        self.diffs.invalidate_version(&deleted.id);

        tracing::info!(
            document_id = %document_id,
            version_number = deleted.version_number,
            "Deleted version"
        );
        Ok(deleted)
    }

    pub async fn set_approval(
        &self,
        document_id: &str,
        version_id: &str,
        approved: bool,
    ) -> Result<DocumentVersion, AppError> {
        db::set_approval(&self.pool, document_id, version_id, approved)
            .await?
            .ok_or(AppError::NotFound)
    }

    // ============================
    // diff
    // ============================

    /// 두 버전을 정규 순서(낮은 번호 → 높은 번호)로 정렬합니다.
    ///
    /// 반환값의 세 번째 값은 호출자가 높은 번호를 먼저 줬는지 여부입니다.
    pub async fn ordered_pair(
        &self,
        document_id: &str,
        version_a: &str,
        version_b: &str,
    ) -> Result<(DocumentVersion, DocumentVersion, bool), AppError> {
        let a = self.require_version(document_id, version_a).await?;
        let b = self.require_version(document_id, version_b).await?;

        if a.version_number <= b.version_number {
            Ok((a, b, false))
        } else {
            Ok((b, a, true))
        }
    }

    /// 두 버전의 문자 단위 diff. 통계는 항상 older → newer 방향입니다.
    pub async fn diff(
        &self,
        document_id: &str,
        version_a: &str,
        version_b: &str,
    ) -> Result<DiffResult, AppError> {
        let (older, newer, swapped) = self.ordered_pair(document_id, version_a, version_b).await?;

        let stats = match self.diffs.get(document_id, &older.id, &newer.id) {
            Some(stats) => {
                tracing::debug!(document_id = %document_id, "Diff cache hit");
                stats
            }
            None => {
                let old_text = self.read_version_text(&older).await?;
                let new_text = self.read_version_text(&newer).await?;
                let stats =
                    run_blocking(DIFF_TASK_TIMEOUT, move || compute_diff(&old_text, &new_text))
                        .await?;
                self.diffs.insert(document_id, &older.id, &newer.id, stats);
                stats
            }
        };

        Ok(DiffResult {
            document_id: document_id.to_string(),
            older_version_id: older.id,
            older_version_number: older.version_number,
            newer_version_id: newer.id,
            newer_version_number: newer.version_number,
            stats,
            swapped,
        })
    }
}
