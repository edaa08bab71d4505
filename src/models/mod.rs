//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! - `document`: 문서, 목록 필터, 페이지네이션
//! - `version`: 문서 버전과 파일 참조
//! - `analysis`: diff 통계, AI 비교 요약, 단일 문서 분석
//! - `billing`: AI 토큰 잔액
//!
//! `pub use X::*;`로 재공개하여 `crate::models::Document`처럼 짧게 접근합니다.

pub mod analysis;
pub mod billing;
pub mod document;
pub mod version;

pub use analysis::*;
pub use billing::*;
pub use document::*;
pub use version::*;
