use serde::{Deserialize, Serialize};

/// AI 토큰 잔액. 클라이언트 쪽 값은 참고용이고 서버의 거절이 최종입니다.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    pub total_available: i64,
}
