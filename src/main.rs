//! # lexdocs 웹 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 연결 풀 생성 + 마이그레이션
//! 4. 업로드 디렉토리 생성, AI 토큰 원장 초기 지급
//! 5. API 라우터 설정
//! 6. HTTP 서버 시작

use anyhow::Result; // main에서는 어떤 에러든 담을 수 있는 anyhow::Result를 씁니다.
use lexdocs::{
    config::Config,
    db,
    routes::{self, AppState},
    services::storage::LocalStorage,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅 초기화 ──
    // RUST_LOG가 없으면 lexdocs, tower_http, axum을 debug 레벨로 출력합니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexdocs=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env()?;
    tracing::info!("Starting lexdocs server on {}:{}", config.host, config.port);

    // ── 4단계: 연결 풀 + 마이그레이션 ──
    tracing::info!("Connecting to database and running migrations...");
    let pool = db::connect(&config.database_url).await?;

    // ── 5단계: 업로드 디렉토리 ──
    let uploads_path = Path::new(&config.uploads_path);
    if !uploads_path.exists() {
        tokio::fs::create_dir_all(uploads_path).await?;
        tracing::info!("Created uploads directory: {}", config.uploads_path);
    }

    // ── 6단계: 토큰 원장 ──
    if db::seed_if_empty(&pool, config.initial_token_balance).await? {
        tracing::info!("Granted {} initial AI tokens", config.initial_token_balance);
    }

    // ── 7단계: 상태와 라우터 ──
    let storage = Arc::new(LocalStorage::new(&config.uploads_path));
    let state = AppState::new(pool, storage, &config);
    let app = routes::router(state, config.max_upload_bytes);

    // ── 8단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
