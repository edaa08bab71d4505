//! # 문서 버전(Version) 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET    /api/v1/documents/{id}/versions`                      → 버전 목록 (최신순, `limit`/`offset`)
//! - `POST   /api/v1/documents/{id}/versions`                      → 새 파일 업로드 → 새 현재 버전
//! - `DELETE /api/v1/documents/{id}/versions/{version_id}`         → 현재가 아닌 버전 삭제
//! - `POST   /api/v1/documents/{id}/versions/{version_id}/restore` → 과거 버전을 새 버전으로 복원
//! - `PUT    /api/v1/documents/{id}/versions/{version_id}/approval`→ 승인 여부 설정
//! - `GET    /api/v1/documents/{id}/diff?version_a=&version_b=`    → 문자 단위 diff 통계
//! - `GET    /api/v1/versions/{id}`                                → 버전 메타데이터
//! - `GET    /api/v1/versions/{id}/file`                           → 버전 파일 바이트

use crate::{error::AppError, middleware::auth::AuthUser, models::*};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::documents::{upload_from_request, AppState};

pub async fn list_versions(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<VersionListQuery>,
) -> Result<Json<VersionPage>, AppError> {
    let page = state.versions.list_versions(&id, query).await?;
    Ok(Json(page))
}

/// `POST /documents/{id}/versions` — 요청 본문이 새 파일, 쿼리 `change_note`가 변경 메모
pub async fn create_version(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<CreateVersionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentVersion>), AppError> {
    let file = upload_from_request(&headers, body)?;
    let version = state
        .versions
        .create_version(&id, &file, &auth_user.user_id, query.change_note.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn get_version(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(version_id): Path<String>,
) -> Result<Json<DocumentVersion>, AppError> {
    let version = state.versions.get_version(&version_id).await?;
    Ok(Json(version))
}

/// 헤더에 넣을 수 있도록 파일명을 ASCII로 바꿉니다.
fn ascii_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `GET /versions/{id}/file` — 저장된 파일을 원래 MIME 타입으로 돌려줍니다.
pub async fn get_version_file(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(version_id): Path<String>,
) -> Result<Response, AppError> {
    let (version, bytes) = state.versions.read_version_file(&version_id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        ascii_file_name(&version.original_file_name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, version.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// `DELETE /documents/{id}/versions/{version_id}` — 현재 버전이면 409
pub async fn delete_version(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path((id, version_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.versions.delete_version(&id, &version_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /documents/{id}/versions/{version_id}/restore` — HTTP 201 + 새 버전
pub async fn restore_version(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, version_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<DocumentVersion>), AppError> {
    let version = state
        .versions
        .restore_version(&id, &version_id, &auth_user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn set_approval(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path((id, version_id)): Path<(String, String)>,
    Json(req): Json<ApprovalRequest>,
) -> Result<Json<DocumentVersion>, AppError> {
    let version = state
        .versions
        .set_approval(&id, &version_id, req.approved)
        .await?;
    Ok(Json(version))
}

/// `GET /documents/{id}/diff` — 통계는 항상 낮은 번호 → 높은 번호 방향
pub async fn diff_versions(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> Result<Json<DiffResult>, AppError> {
    let result = state
        .versions
        .diff(&id, &query.version_a, &query.version_b)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_made_header_safe() {
        assert_eq!(ascii_file_name("lease v2.pdf"), "lease v2.pdf");
        assert_eq!(ascii_file_name("계약서.pdf"), "___.pdf");
        assert_eq!(ascii_file_name("a\"b.txt"), "a_b.txt");
    }
}
