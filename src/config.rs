//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: 인증 제공자와 공유하는 JWT 서명 비밀키 (필수)
//! - `UPLOADS_PATH`: 업로드 파일 저장 디렉토리
//! - `HOST`, `PORT`: 서버 바인딩 주소
//! - `MAX_UPLOAD_BYTES`: 업로드 최대 크기
//! - `ALLOWED_EXTENSIONS`: 허용 확장자 목록 (쉼표 구분)
//! - `UPLOAD_TIMEOUT_SECS`, `AI_TIMEOUT_SECS`: 외부 호출 시간 제한
//! - `INITIAL_TOKEN_BALANCE`: 원장이 비어 있을 때 지급할 AI 토큰

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::upload::{UploadPolicy, DEFAULT_ALLOWED_EXTENSIONS};

/// 업로드 최대 크기 기본값 (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/lexdocs.db")
    pub database_url: String,
    /// JWT 토큰 검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 업로드 파일이 저장되는 디렉토리 경로
    pub uploads_path: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    /// 업로드 최대 크기 (바이트)
    pub max_upload_bytes: u64,
    /// 업로드 허용 확장자 (소문자, 점 없이)
    pub allowed_extensions: Vec<String>,
    /// 저장소 전송 시간 제한
    pub upload_timeout: Duration,
    /// AI 제공자 호출 시간 제한
    pub ai_timeout: Duration,
    /// 원장 초기 토큰 지급량
    pub initial_token_balance: i64,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있고, 숫자 파싱에 실패해도 기본값을 사용합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            uploads_path: env::var("UPLOADS_PATH")
                .unwrap_or_else(|_| "data/uploads".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .map(|raw| parse_extension_list(&raw))
                .unwrap_or_else(|_| default_extensions()),
            upload_timeout: Duration::from_secs(parse_or("UPLOAD_TIMEOUT_SECS", 120)),
            ai_timeout: Duration::from_secs(parse_or("AI_TIMEOUT_SECS", 60)),
            initial_token_balance: parse_or("INITIAL_TOKEN_BALANCE", 100_000),
        })
    }

    /// 설정값으로 업로드 검증 정책을 만듭니다.
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(self.allowed_extensions.clone(), self.max_upload_bytes)
    }
}

/// 환경변수를 읽어 파싱하고, 없거나 파싱에 실패하면 기본값을 돌려줍니다.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// "pdf, .DOCX,txt" → ["pdf", "docx", "txt"]
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    let parsed: Vec<String> = raw
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    if parsed.is_empty() {
        default_extensions()
    } else {
        parsed
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_list_is_normalised() {
        assert_eq!(
            parse_extension_list("pdf, .DOCX,,txt "),
            vec!["pdf".to_string(), "docx".to_string(), "txt".to_string()]
        );
    }

    #[test]
    fn empty_extension_list_falls_back_to_defaults() {
        assert_eq!(parse_extension_list(" , "), default_extensions());
    }
}
