//! # 업로드 파이프라인
//!
//! ```text
//! UploadFile ──validate()──▶ (형식/크기 통과) ──StorageBackend::put()──▶ FileRef
//!               │ 실패: Validation / UnsupportedFormat / FileTooLarge   │ 실패/시간 초과: UploadFailed
//!               └─ 저장소를 호출하기 전에 즉시 반환                        └─ 버전 레코드는 만들지 않음
//! ```
//!
//! 같은 문서에 대한 동시 업로드의 순서는 `VersionStore`가 버전 번호 발급 시점에 정합니다.
//! 업로드 자체는 서로 독립적입니다.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::models::FileRef;
use crate::services::storage::StorageBackend;

/// 기본 허용 확장자
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "txt", "md", "xls", "xlsx", "csv", "ppt", "pptx", "png",
    "jpg", "jpeg",
];

/// 확장자별로 인정하는 MIME 타입. 첫 번째 값이 대표 타입입니다.
fn known_mime_types(extension: &str) -> Option<&'static [&'static str]> {
    let types: &'static [&'static str] = match extension {
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword"],
        "docx" => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        "odt" => &["application/vnd.oasis.opendocument.text"],
        "rtf" => &["application/rtf", "text/rtf"],
        "txt" => &["text/plain"],
        "md" => &["text/markdown", "text/x-markdown", "text/plain"],
        "xls" => &["application/vnd.ms-excel"],
        "xlsx" => &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
        "csv" => &["text/csv", "text/plain", "application/vnd.ms-excel"],
        "ppt" => &["application/vnd.ms-powerpoint"],
        "pptx" => &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
        "png" => &["image/png"],
        "jpg" | "jpeg" => &["image/jpeg"],
        _ => return None,
    };
    Some(types)
}

const GENERIC_MIME: &str = "application/octet-stream";

/// 업로드할 파일 — 이름, 클라이언트가 선언한 MIME 타입, 바이트
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.map(str::to_string),
            bytes,
        }
    }

    /// 경로가 섞인 파일명에서 마지막 구성요소만 남깁니다. ("C:\docs\a.pdf" → "a.pdf")
    pub fn base_name(&self) -> &str {
        self.file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("")
            .trim()
    }

    /// 소문자 확장자 (점 제외)
    pub fn extension(&self) -> Option<String> {
        Path::new(self.base_name())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// 형식/크기 검증 정책
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl UploadPolicy {
    pub fn new(allowed_extensions: Vec<String>, max_bytes: u64) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// 파일을 검증하고, 저장할 때 사용할 MIME 타입을 결정합니다.
    ///
    /// 네트워크나 저장소를 전혀 건드리지 않는 순수 검사입니다.
    ///
    /// # 에러
    /// - `Validation`: 파일명 없음, 빈 파일
    /// - `UnsupportedFormat`: 허용 목록에 없는 확장자, 확장자와 맞지 않는 MIME 타입
    /// - `FileTooLarge`: 최대 크기 초과
    pub fn validate(&self, file: &UploadFile) -> Result<String, AppError> {
        let name = file.base_name();
        if name.is_empty() {
            return Err(AppError::Validation("file name is required".to_string()));
        }

        let extension = file.extension().ok_or_else(|| {
            AppError::UnsupportedFormat(format!("'{}' has no file extension", name))
        })?;

        if !self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            return Err(AppError::UnsupportedFormat(format!(
                ".{} files are not accepted",
                extension
            )));
        }

        if file.bytes.is_empty() {
            return Err(AppError::Validation(format!("'{}' is empty", name)));
        }

        let size = file.bytes.len() as u64;
        if size > self.max_bytes {
            return Err(AppError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        // "text/plain; charset=utf-8" → "text/plain"
        let declared = file
            .mime_type
            .as_deref()
            .and_then(|mime| mime.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .filter(|mime| !mime.is_empty() && mime != GENERIC_MIME);

        match (known_mime_types(&extension), declared) {
            (Some(known), Some(declared)) => {
                if known.contains(&declared.as_str()) {
                    Ok(declared)
                } else {
                    Err(AppError::UnsupportedFormat(format!(
                        "content type '{}' does not match .{}",
                        declared, extension
                    )))
                }
            }
            (Some(known), None) => Ok(known[0].to_string()),
            (None, Some(declared)) => Ok(declared),
            (None, None) => Ok(GENERIC_MIME.to_string()),
        }
    }
}

/// "<uuid v7>-<slug>.<ext>" 형태의 저장소 키를 만듭니다.
pub fn storage_key(file: &UploadFile) -> String {
    let name = file.base_name();
    let stem = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("");
    let mut slug = slug::slugify(stem);
    if slug.is_empty() {
        slug = "file".to_string();
    }

    match file.extension() {
        Some(ext) => format!("{}-{}.{}", uuid::Uuid::now_v7(), slug, ext),
        None => format!("{}-{}", uuid::Uuid::now_v7(), slug),
    }
}

/// SHA-256 체크섬 (hex)
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 검증 → 저장 → `FileRef` 반환을 담당하는 파이프라인
///
/// 내부는 `Arc`라서 clone해도 정책과 저장소를 공유합니다.
#[derive(Clone)]
pub struct UploadPipeline {
    policy: Arc<UploadPolicy>,
    storage: Arc<dyn StorageBackend>,
    timeout: Duration,
}

impl UploadPipeline {
    pub fn new(policy: UploadPolicy, storage: Arc<dyn StorageBackend>, timeout: Duration) -> Self {
        Self {
            policy: Arc::new(policy),
            storage,
            timeout,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// 검증만 수행합니다.
    pub fn validate(&self, file: &UploadFile) -> Result<String, AppError> {
        self.policy.validate(file)
    }

    /// 파일을 검증한 뒤 저장소에 올립니다.
    ///
    /// 검증 실패는 저장소 호출 없이 바로 반환됩니다.
    /// 저장소 에러와 시간 초과는 모두 `UploadFailed`로 바뀝니다.
    pub async fn upload(&self, file: &UploadFile) -> Result<FileRef, AppError> {
        let mime_type = self.policy.validate(file)?;
        let key = storage_key(file);

        let url = match tokio::time::timeout(self.timeout, self.storage.put(&key, &file.bytes)).await
        {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => return Err(AppError::UploadFailed(e.to_string())),
            Err(_) => {
                return Err(AppError::UploadFailed(format!(
                    "storage did not respond within {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        tracing::info!(
            url = %url,
            size = file.bytes.len(),
            mime_type = %mime_type,
            "Stored uploaded file"
        );

        Ok(FileRef {
            url,
            size: file.bytes.len() as i64,
            mime_type,
            original_file_name: file.base_name().to_string(),
            checksum: checksum(&file.bytes),
        })
    }

    /// 버전 생성에 실패한 업로드를 정리합니다. 실패해도 경고만 남깁니다.
    pub async fn discard(&self, file: &FileRef) {
        if let Err(e) = self.storage.delete(&file.url).await {
            tracing::warn!(url = %file.url, "Failed to discard orphaned upload: {}", e);
        }
    }
}
