//! # 파일 저장소(Storage) 서비스
//!
//! 업로드된 문서 파일의 바이트를 보관하는 저장소 추상화입니다.
//!
//! 구현체:
//! - `LocalStorage`: `tokio::fs`로 업로드 디렉토리에 저장 (`local://<key>`)
//! - `MemoryStorage`: 프로세스 메모리에 저장 (`memory://<key>`), 테스트용
//!
//! 저장소 키는 업로드 파이프라인이 만들며, 경로 구분자나 `..`를 포함하지 않습니다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::fs;

use crate::error::AppError;

/// 파일 바이트 저장소
///
/// 네트워크 저장소로 바꿔 끼울 수 있도록 dyn 호환 비동기 트레이트로 정의합니다.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// `key`로 바이트를 저장하고 영속 URL을 반환합니다.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// URL이 가리키는 바이트를 읽습니다. 없으면 `NotFound`.
    async fn get(&self, url: &str) -> Result<Vec<u8>, AppError>;

    /// URL이 가리키는 파일을 삭제합니다. 이미 없으면 성공으로 봅니다.
    async fn delete(&self, url: &str) -> Result<(), AppError>;
}

/// 키에 경로 조작 문자가 없는지 확인합니다.
fn checked_key<'a>(url: &'a str, scheme: &str) -> Result<&'a str, AppError> {
    let key = url
        .strip_prefix(scheme)
        .ok_or_else(|| AppError::Validation(format!("unsupported storage url '{}'", url)))?;

    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(AppError::Validation(format!("invalid storage key '{}'", key)));
    }
    Ok(key)
}

/// 로컬 디스크 저장소
pub struct LocalStorage {
    root: PathBuf,
}

const LOCAL_SCHEME: &str = "local://";

impl LocalStorage {
    /// # 매개변수
    /// - `root`: 업로드 파일을 저장할 디렉토리 (예: "data/uploads")
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, AppError> {
        let key = checked_key(url, LOCAL_SCHEME)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, AppError> {
        let url = format!("{LOCAL_SCHEME}{key}");
        let full_path = self.path_for(&url)?;

        // 디렉토리가 지워졌어도 다시 만들고 씁니다.
        fs::create_dir_all(&self.root).await?;
        fs::write(&full_path, bytes).await?;
        Ok(url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let full_path = self.path_for(url)?;
        match fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let full_path = self.path_for(url)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 인메모리 저장소 (테스트용)
///
/// `put` 호출 횟수를 세어 "네트워크 호출 없이 거절되었는지"를 확인할 수 있습니다.
/// `fail_puts`를 켜면 모든 `put`이 실패합니다.
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
}

const MEMORY_SCHEME: &str = "memory://";

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 호출된 `put` 횟수 (실패 포함)
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// 저장된 파일 수
    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 이후의 `put`을 모두 실패시킵니다.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

fn poisoned() -> AppError {
    AppError::Internal("memory storage lock poisoned".to_string())
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, AppError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "storage unavailable",
            )));
        }

        let url = format!("{MEMORY_SCHEME}{key}");
        checked_key(&url, MEMORY_SCHEME)?;
        self.files
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), bytes.to_vec());
        Ok(url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let key = checked_key(url, MEMORY_SCHEME)?;
        self.files
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let key = checked_key(url, MEMORY_SCHEME)?;
        self.files.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}
