//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수와 라우터 조립 함수(`router`)를 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `documents`: 문서 CRUD, 메모 저장, 공유 상태(`AppState`)
//! - `versions`: 버전 목록/업로드/복원/삭제/승인, 파일 다운로드, diff
//! - `analysis`: AI 비교 요약과 문서 분석
//! - `billing`: AI 토큰 잔액
//! - `health`: 서버 상태 확인 (헬스체크)

pub mod analysis;
pub mod billing;
pub mod documents;
pub mod health;
pub mod versions;

// 각 모듈의 핸들러 함수들을 재공개하여 `routes::list_documents`처럼 바로 접근 가능하게 합니다.
pub use analysis::*;
pub use billing::*;
pub use documents::*;
pub use health::*;
pub use versions::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use std::convert::Infallible;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// 업로드 라우트의 본문 크기 제한을 기본값(2MB) 대신 설정값으로 바꿉니다.
///
/// 한도는 최대 크기보다 1바이트 크게 잡습니다. 정확히 1바이트를 넘은 파일은
/// 업로드 검증에서 `file_too_large` JSON 에러로 응답됩니다.
fn with_upload_limit<S>(route: MethodRouter<S>, max_upload_bytes: u64) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let limit = usize::try_from(max_upload_bytes.saturating_add(1)).unwrap_or(usize::MAX);
    route
        .layer::<_, Infallible>(RequestBodyLimitLayer::new(limit))
        .layer(DefaultBodyLimit::disable())
}

/// `/api/v1` 아래에 모든 API 라우트를 붙인 라우터를 만듭니다.
///
/// `/health`를 뺀 모든 핸들러는 `AuthUser` 추출기로 JWT를 요구합니다.
pub fn router(state: AppState, max_upload_bytes: u64) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        // 문서(Document)
        .route(
            "/documents",
            with_upload_limit(post(create_document), max_upload_bytes).get(list_documents),
        )
        .route(
            "/documents/{id}",
            get(get_document).patch(update_document).delete(delete_document),
        )
        .route("/documents/{id}/notes", put(update_notes))
        // 버전(Version)
        .route(
            "/documents/{id}/versions",
            with_upload_limit(post(create_version), max_upload_bytes).get(list_versions),
        )
        .route(
            "/documents/{id}/versions/{version_id}",
            delete(delete_version),
        )
        .route(
            "/documents/{id}/versions/{version_id}/restore",
            post(restore_version),
        )
        .route(
            "/documents/{id}/versions/{version_id}/approval",
            put(set_approval),
        )
        .route("/documents/{id}/diff", get(diff_versions))
        .route("/versions/{id}", get(get_version))
        .route("/versions/{id}/file", get(get_version_file))
        // AI 비교 요약 / 문서 분석
        .route(
            "/documents/{id}/comparisons",
            get(get_comparison).post(create_comparison),
        )
        .route(
            "/documents/{id}/analyses",
            get(get_analysis).post(create_analysis),
        )
        .route("/billing/balance", get(get_balance))
        .with_state(state);

    // 개발 환경 기준으로 모든 출처를 허용합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
