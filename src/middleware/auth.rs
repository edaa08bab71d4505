//! # 요청자 식별
//!
//! 인증 제공자가 발급한 HS256 JWT(`Authorization: Bearer <token>`)를 검증하고,
//! `sub` 클레임을 사용자 ID로 꺼냅니다. 이 ID가 버전 작성자로 기록됩니다.
//!
//! 로그인/토큰 발급은 외부 인증 제공자의 일이며, `create_access_token`은
//! 같은 비밀키로 토큰을 만들어야 하는 도구와 테스트에서 씁니다.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::routes::documents::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: i64,
    pub iat: i64,
}

/// 핸들러 인자로 받으면 인증된 요청만 통과합니다.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        let claims = verify_access_token(token, &state.jwt_secret)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            AuthError::MissingToken => ("missing_token", "Authorization token is required"),
            AuthError::InvalidToken => ("invalid_token", "Invalid authorization token"),
            AuthError::ExpiredToken => ("expired_token", "Authorization token has expired"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// `ttl` 동안 유효한 토큰을 만듭니다.
pub fn create_access_token(
    user_id: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_with_the_shared_secret() {
        let token = create_access_token("user-7", "secret", Duration::minutes(5)).unwrap();
        assert_eq!(verify_access_token(&token, "secret").unwrap().sub, "user-7");
        assert_eq!(
            verify_access_token(&token, "other-secret").unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn expired_tokens_are_reported_as_expired() {
        // jsonwebtoken 기본 leeway(60초)보다 오래 지난 토큰
        let token = create_access_token("user-7", "secret", Duration::minutes(-5)).unwrap();
        assert_eq!(
            verify_access_token(&token, "secret").unwrap_err(),
            AuthError::ExpiredToken
        );
    }
}
