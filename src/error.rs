//! # 에러 처리 모듈
//!
//! 문서 버전 관리 서비스에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 검증, 업로드, 버전 조작, AI 토큰 부족 등 모든 에러를 하나로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답(JSON)으로 자동 변환
//!
//! 검증/형식 에러는 네트워크나 DB에 닿기 전에 발생하며, 클라이언트가 그대로
//! 사용자에게 보여줄 수 있는 메시지를 담습니다. 내부 에러는 로그에만 자세히 남깁니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 각 variant는 적절한 HTTP 상태 코드와 에러 코드(`code`)로 변환됩니다.
/// 특히 `InsufficientTokens`는 일반 실패와 구분되는 전용 코드를 가지므로,
/// 클라이언트는 "재시도" 대신 "토큰 충전" 경로를 안내할 수 있습니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스(문서, 버전, 캐시된 요약)를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 필수 필드 누락 또는 잘못된 값 (HTTP 400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 허용되지 않은 파일 확장자 또는 MIME 타입 (HTTP 415)
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 업로드 최대 크기 초과 (HTTP 413)
    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    /// 저장소 전송 실패 또는 시간 초과 (HTTP 502)
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// 현재 상태에서 허용되지 않는 조작 (예: 현재 버전 삭제) (HTTP 409)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// AI 기능 사용에 필요한 토큰 잔액 부족 (HTTP 402)
    #[error("Insufficient tokens: {required} required, {available} available")]
    InsufficientTokens { required: i64, available: i64 },

    /// 외부 협력 서비스(AI 제공자 등) 호출 실패 (HTTP 502)
    #[error("Network error: {0}")]
    Network(String),

    /// 인증 실패 (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 리소스 충돌 (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from]: sqlx 함수의 에러에 `?`를 쓰면 자동으로 이 variant로 변환됩니다.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 파일 입출력 오류 (HTTP 500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// 응답 본문의 `error.code` 값
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::UnsupportedFormat(_) => "unsupported_format",
            AppError::FileTooLarge { .. } => "file_too_large",
            AppError::UploadFailed(_) => "upload_failed",
            AppError::InvalidOperation(_) => "invalid_operation",
            AppError::InsufficientTokens { .. } => "insufficient_tokens",
            AppError::Network(_) => "network_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
            AppError::Database(_) => "database_error",
            AppError::Io(_) => "io_error",
        }
    }

    /// 에러 종류에 대응하는 HTTP 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UploadFailed(_) | AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidOperation(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientTokens { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) | AppError::Database(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// SQLite UNIQUE 제약 위반을 `Conflict`로 바꿉니다. 그 외 DB 에러는 그대로 둡니다.
    pub fn from_unique_violation(err: sqlx::Error, message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(message.to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, IO, Internal)는 실제 에러 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "A database error occurred".to_string()
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                "An IO error occurred".to_string()
            }
            AppError::UploadFailed(msg) | AppError::Network(msg) => {
                tracing::warn!("Upstream failure ({}): {}", code, msg);
                self.to_string()
            }
            _ => self.to_string(),
        };

        // 결과: { "error": { "code": "not_found", "message": "Resource not found" } }
        let mut error = json!({
            "code": code,
            "message": message
        });

        // 토큰 부족은 클라이언트가 충전 안내에 쓸 수 있도록 수치를 함께 보냅니다.
        if let AppError::InsufficientTokens { required, available } = self {
            error["required"] = json!(required);
            error["available"] = json!(available);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
