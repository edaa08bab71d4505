//! # lexdocs
//!
//! 법률 사무 문서의 버전 관리 서버입니다.
//! 업로드 → 버전 생성 → 버전 비교(diff) → AI 요약 흐름을 담당합니다.
//!
//! 실행 파일(`main.rs`)과 통합 테스트(`tests/`)가 같은 모듈을 쓰도록 라이브러리로 공개합니다.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
