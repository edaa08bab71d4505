//! # AI 토큰 잔액
//!
//! 잔액은 서버(원장)가 관리하는 공유 카운터입니다. 호출 전 잔액 확인은 참고용이며,
//! 실제 차감(`spend`)의 거절이 최종 판단입니다.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::models::Balance;

#[async_trait]
pub trait TokenBalance: Send + Sync {
    async fn get_balance(&self) -> Result<Balance, AppError>;

    /// `amount`만큼 차감합니다. 잔액이 모자라면 `InsufficientTokens`.
    async fn spend(
        &self,
        amount: i64,
        reason: &str,
        document_id: Option<&str>,
    ) -> Result<(), AppError>;

    /// 차감했지만 결과를 저장하지 못한 토큰을 돌려줍니다.
    async fn refund(&self, amount: i64, reason: &str) -> Result<(), AppError>;
}

/// `token_ledger` 테이블 기반 잔액
#[derive(Clone)]
pub struct LedgerBalance {
    pool: SqlitePool,
}

impl LedgerBalance {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBalance for LedgerBalance {
    async fn get_balance(&self) -> Result<Balance, AppError> {
        Ok(Balance {
            total_available: db::ledger::balance(&self.pool).await?,
        })
    }

    async fn spend(
        &self,
        amount: i64,
        reason: &str,
        document_id: Option<&str>,
    ) -> Result<(), AppError> {
        if amount <= 0 {
            return Ok(());
        }

        if db::ledger::debit_if_available(&self.pool, amount, reason, document_id).await? {
            return Ok(());
        }

        let available = db::ledger::balance(&self.pool).await?;
        Err(AppError::InsufficientTokens {
            required: amount,
            available,
        })
    }

    async fn refund(&self, amount: i64, reason: &str) -> Result<(), AppError> {
        if amount <= 0 {
            return Ok(());
        }
        db::ledger::credit(&self.pool, amount, reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejection_reports_required_and_available() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        db::ledger::seed_if_empty(&pool, 50).await.unwrap();
        let balance = LedgerBalance::new(pool);

        balance.spend(30, "summary", None).await.unwrap();
        match balance.spend(30, "summary", None).await {
            Err(AppError::InsufficientTokens {
                required,
                available,
            }) => {
                assert_eq!(required, 30);
                assert_eq!(available, 20);
            }
            other => panic!("expected InsufficientTokens, got {:?}", other),
        }

        balance.refund(10, "refund").await.unwrap();
        assert_eq!(balance.get_balance().await.unwrap().total_available, 30);
    }
}
