//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 서비스(services/)와 라우트 핸들러(routes/)가 이 모듈의 함수를 호출합니다.
//!
//! 각 하위 모듈:
//! - `documents`: 문서 CRUD, 목록 필터/페이지네이션, 메모 저장
//! - `versions`: 버전 생성(트랜잭션), 조회, 삭제, 승인
//! - `analyses`: 버전 비교 요약과 단일 문서 분석 캐시
//! - `ledger`: AI 토큰 원장

pub mod analyses;
pub mod documents;
pub mod ledger;
pub mod versions;

pub use analyses::*;
pub use documents::*;
pub use ledger::*;
pub use versions::*;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// SQLite 연결 풀을 만들고 마이그레이션을 실행합니다.
///
/// `sqlite::memory:` URL이면 연결을 하나로 고정합니다.
/// 인메모리 DB는 연결마다 따로 생기므로, 연결이 닫히면 데이터도 사라지기 때문입니다.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // foreign_keys는 sqlx 기본값이 ON이라 ON DELETE CASCADE가 동작합니다.
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options.journal_mode(SqliteJournalMode::Wal))
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

