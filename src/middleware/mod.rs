//! # 미들웨어 / 추출기
//!
//! - `auth`: Bearer JWT에서 요청자(`AuthUser`)를 꺼내는 추출기

pub mod auth;
