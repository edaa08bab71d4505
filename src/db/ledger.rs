//! # AI 토큰 원장 쿼리 모듈
//!
//! 잔액은 별도 컬럼 없이 `SUM(delta)`로 계산합니다.
//! 차감은 "잔액이 충분할 때만 INSERT"하는 한 문장이라 동시 요청에도 음수가 되지 않습니다.

use crate::error::AppError;
use sqlx::SqlitePool;

/// 현재 사용 가능한 토큰 수
pub async fn balance(pool: &SqlitePool) -> Result<i64, AppError> {
    let total = sqlx::query_scalar("SELECT COALESCE(SUM(delta), 0) FROM token_ledger")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

/// 원장이 비어 있을 때만 초기 토큰을 지급합니다. 지급했으면 true.
pub async fn seed_if_empty(pool: &SqlitePool, amount: i64) -> Result<bool, AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO token_ledger (id, delta, reason)
        SELECT ?, ?, 'initial grant'
        WHERE NOT EXISTS (SELECT 1 FROM token_ledger)
        "#,
    )
    .bind(&id)
    .bind(amount)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 토큰을 지급합니다.
pub async fn credit(pool: &SqlitePool, amount: i64, reason: &str) -> Result<(), AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    sqlx::query("INSERT INTO token_ledger (id, delta, reason) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(amount)
        .bind(reason)
        .execute(pool)
        .await?;

    Ok(())
}

/// 잔액이 `amount` 이상일 때만 차감합니다.
///
/// # 반환값
/// - `Ok(true)`: 차감 완료
/// - `Ok(false)`: 잔액 부족 (원장은 바뀌지 않음)
pub async fn debit_if_available(
    pool: &SqlitePool,
    amount: i64,
    reason: &str,
    document_id: Option<&str>,
) -> Result<bool, AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO token_ledger (id, delta, reason, document_id)
        SELECT ?, ?, ?, ?
        WHERE (SELECT COALESCE(SUM(delta), 0) FROM token_ledger) >= ?
        "#,
    )
    .bind(&id)
    .bind(-amount)
    .bind(reason)
    .bind(document_id)
    .bind(amount)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
