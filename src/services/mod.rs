//! # 서비스 계층
//!
//! 라우트 핸들러와 DB 계층 사이에서 업무 규칙을 담당합니다.
//! - `storage`: 파일 바이트 저장소 (로컬 디스크 / 메모리)
//! - `upload`: 형식/크기 검증 후 저장소 업로드
//! - `versioning`: 문서와 버전 수명주기, diff
//! - `diff`: 문자 단위 diff 통계와 캐시
//! - `ai`: AI 요약 제공자
//! - `balance`: AI 토큰 잔액
//! - `analysis`: 비교 요약/문서 분석 생성과 캐시
//! - `autosave`, `timer`: 메모 자동 저장과 지연 작업

pub mod ai;
pub mod analysis;
pub mod autosave;
pub mod balance;
pub mod diff;
pub mod storage;
pub mod timer;
pub mod upload;
pub mod versioning;
