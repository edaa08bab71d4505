//! # 문서(Document) 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET    /api/v1/documents`           → 문서 목록 (필터, 페이지네이션)
//! - `POST   /api/v1/documents`           → 파일 업로드와 함께 새 문서 생성 (버전 1)
//! - `GET    /api/v1/documents/{id}`      → 단일 문서 조회
//! - `PATCH  /api/v1/documents/{id}`      → 메타데이터 수정 (부분 업데이트)
//! - `DELETE /api/v1/documents/{id}`      → 문서와 모든 버전 삭제
//! - `PUT    /api/v1/documents/{id}/notes` → 메모 저장 (자동 저장용, 멱등)
//!
//! ## 업로드 요청 형식
//! 요청 본문 전체가 파일 바이트입니다. 파일명은 `X-File-Name` 헤더,
//! MIME 타입은 `Content-Type` 헤더, 나머지 메타데이터는 쿼리 문자열로 받습니다.
//! ```text
//! POST /api/v1/documents?name=Lease&case_id=c-1&change_note=first%20draft
//! Content-Type: application/pdf
//! X-File-Name: lease.pdf
//!
//! <file bytes>
//! ```

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    services::{
        ai::ExtractiveProvider,
        analysis::AnalysisService,
        balance::LedgerBalance,
        storage::StorageBackend,
        upload::{UploadFile, UploadPipeline},
        versioning::VersionStore,
    },
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

/// 파일명을 담는 요청 헤더
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 서비스 객체는 내부가 `Arc`라서 clone해도 같은 풀/캐시/잠금을 공유합니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (헬스체크용)
    pub pool: SqlitePool,
    /// 문서/버전 수명주기
    pub versions: VersionStore,
    /// AI 비교 요약과 문서 분석
    pub analysis: AnalysisService,
    /// JWT 토큰 검증용 비밀키
    pub jwt_secret: String,
}

impl AppState {
    /// 설정값으로 서비스 객체들을 조립합니다.
    pub fn new(pool: SqlitePool, storage: Arc<dyn StorageBackend>, config: &Config) -> Self {
        let uploads = UploadPipeline::new(config.upload_policy(), storage, config.upload_timeout);
        let versions = VersionStore::new(pool.clone(), uploads);
        let analysis = AnalysisService::new(
            versions.clone(),
            Arc::new(ExtractiveProvider::new()),
            Arc::new(LedgerBalance::new(pool.clone())),
            config.ai_timeout,
        );

        Self {
            pool,
            versions,
            analysis,
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}

/// 업로드 요청의 헤더와 본문으로 `UploadFile`을 만듭니다.
pub(crate) fn upload_from_request(headers: &HeaderMap, body: Bytes) -> Result<UploadFile, AppError> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Validation("X-File-Name header is required".to_string()))?;

    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    Ok(UploadFile::new(file_name, mime_type, body.to_vec()))
}

/// `GET /documents` — 필터에 맞는 문서 목록
///
/// 쿼리: `case_id`, `client_id`, `category`, `status`, `starred`, `search`, `page`, `limit`
pub async fn list_documents(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<DocumentPage>, AppError> {
    let page = state.versions.list_documents(&filter).await?;
    Ok(Json(page))
}

/// `GET /documents/{id}`
pub async fn get_document(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let document = state.versions.get_document(&id).await?;
    Ok(Json(document))
}

/// `POST /documents` — 새 문서와 버전 1 생성
///
/// # 반환값
/// HTTP 201 + `{ "document": ..., "version": ... }`
pub async fn create_document(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(req): Query<CreateDocumentRequest>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let file = upload_from_request(&headers, body)?;
    let (document, version) = state
        .versions
        .create_document(&req, &file, &auth_user.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "document": document, "version": version })),
    ))
}

/// `PATCH /documents/{id}` — 요청에 포함된 필드만 수정합니다.
///
/// `case_id`, `client_id`, `category`는 `null`로 보내면 연결이 해제됩니다.
pub async fn update_document(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    let document = state.versions.update_document(&id, req).await?;
    Ok(Json(document))
}

/// `DELETE /documents/{id}` — HTTP 204
pub async fn delete_document(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.versions.delete_document(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /documents/{id}/notes` — 메모 덮어쓰기. 같은 값으로 반복 호출해도 안전합니다.
pub async fn update_notes(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<DocumentNotes>,
) -> Result<Json<DocumentNotes>, AppError> {
    state.versions.update_notes(&id, &req.notes).await?;
    Ok(Json(req))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn upload_requires_a_file_name_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            upload_from_request(&headers, Bytes::from_static(b"x")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn upload_reads_name_and_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(FILE_NAME_HEADER, HeaderValue::from_static("brief.pdf"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));

        let file = upload_from_request(&headers, Bytes::from_static(b"%PDF")).unwrap();
        assert_eq!(file.file_name, "brief.pdf");
        assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.bytes, b"%PDF");
    }
}
