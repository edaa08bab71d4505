//! # 문서 버전 데이터베이스 쿼리 모듈
//!
//! ## 버전 생성 트랜잭션
//! ```text
//! BEGIN
//!   1. documents.last_version_number += 1 (RETURNING)  ← 번호 발급 + 쓰기 잠금
//!   2. 기존 현재 버전의 is_current = 0
//!   3. 새 버전 INSERT (is_current = 1)
//!   4. documents의 현재 파일 참조 / version_count 갱신
//! COMMIT
//! ```
//! 네 단계가 한 트랜잭션이므로 "현재 버전이 둘" 또는 "하나도 없음" 상태는 관찰되지 않습니다.
//! 1단계가 첫 문장이어야 SQLite가 처음부터 쓰기 잠금을 잡습니다.

use crate::error::AppError;
use crate::models::{DocumentVersion, FileRef};
use sqlx::{SqliteConnection, SqlitePool};

const VERSION_COLUMNS: &str = "id, document_id, version_number, author_id, file_url, file_size, \
     mime_type, original_file_name, checksum, change_note, is_current, approved, created_at";

/// 열린 연결(트랜잭션) 위에서 새 현재 버전을 만듭니다.
///
/// 문서가 없으면 `Ok(None)`을 반환합니다. 커밋은 호출자가 합니다.
pub(crate) async fn insert_current_version(
    conn: &mut SqliteConnection,
    id: &str,
    document_id: &str,
    author_id: &str,
    file: &FileRef,
    change_note: &str,
) -> Result<Option<DocumentVersion>, AppError> {
    let next_number: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE documents
        SET last_version_number = last_version_number + 1
        WHERE id = ?
        RETURNING last_version_number
        "#,
    )
    .bind(document_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(version_number) = next_number else {
        return Ok(None);
    };

    sqlx::query("UPDATE document_versions SET is_current = 0 WHERE document_id = ? AND is_current = 1")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO document_versions
            (id, document_id, version_number, author_id, file_url, file_size,
             mime_type, original_file_name, checksum, change_note, is_current)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(id)
    .bind(document_id)
    .bind(version_number)
    .bind(author_id)
    .bind(&file.url)
    .bind(file.size)
    .bind(&file.mime_type)
    .bind(&file.original_file_name)
    .bind(&file.checksum)
    .bind(change_note)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "version number already assigned"))?;

    sqlx::query(
        r#"
        UPDATE documents
        SET file_url = ?, file_size = ?, mime_type = ?,
            version_count = version_count + 1,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ?
        "#,
    )
    .bind(&file.url)
    .bind(file.size)
    .bind(&file.mime_type)
    .bind(document_id)
    .execute(&mut *conn)
    .await?;

    let version = sqlx::query_as::<_, DocumentVersion>(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Some(version))
}

/// 기존 문서에 새 버전을 만들고 현재 버전으로 지정합니다.
///
/// # 반환값
/// - `Ok(Some(version))`: 생성 성공
/// - `Ok(None)`: 문서가 없음
pub async fn create_version(
    pool: &SqlitePool,
    document_id: &str,
    author_id: &str,
    file: &FileRef,
    change_note: &str,
) -> Result<Option<DocumentVersion>, AppError> {
    let id = uuid::Uuid::now_v7().to_string();

    let mut tx = pool.begin().await?;
    let version =
        insert_current_version(&mut *tx, &id, document_id, author_id, file, change_note).await?;
    // 문서가 없으면 커밋하지 않고 tx를 drop → 자동 롤백
    if version.is_some() {
        tx.commit().await?;
    }

    Ok(version)
}

/// 문서의 버전 목록을 최신순(버전 번호 내림차순)으로 조회합니다.
///
/// `limit`이 None이면 전체를 반환합니다. 같은 `offset`으로 다시 호출하면
/// 같은 위치부터 이어서 읽을 수 있습니다.
pub async fn list_versions(
    pool: &SqlitePool,
    document_id: &str,
    limit: Option<u32>,
    offset: u32,
) -> Result<Vec<DocumentVersion>, AppError> {
    // SQLite에서 LIMIT -1은 "제한 없음"
    let limit = limit.map(i64::from).unwrap_or(-1);

    let versions = sqlx::query_as::<_, DocumentVersion>(&format!(
        r#"
        SELECT {VERSION_COLUMNS}
        FROM document_versions
        WHERE document_id = ?
        ORDER BY version_number DESC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(document_id)
    .bind(limit)
    .bind(i64::from(offset))
    .fetch_all(pool)
    .await?;

    Ok(versions)
}

pub async fn count_versions(pool: &SqlitePool, document_id: &str) -> Result<i64, AppError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM document_versions WHERE document_id = ?")
        .bind(document_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn get_version(
    pool: &SqlitePool,
    version_id: &str,
) -> Result<Option<DocumentVersion>, AppError> {
    let version = sqlx::query_as::<_, DocumentVersion>(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions WHERE id = ?"
    ))
    .bind(version_id)
    .fetch_optional(pool)
    .await?;

    Ok(version)
}

/// 특정 문서에 속한 버전만 조회합니다. 다른 문서의 버전 ID면 None.
pub async fn get_document_version(
    pool: &SqlitePool,
    document_id: &str,
    version_id: &str,
) -> Result<Option<DocumentVersion>, AppError> {
    let version = sqlx::query_as::<_, DocumentVersion>(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions WHERE id = ? AND document_id = ?"
    ))
    .bind(version_id)
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    Ok(version)
}

pub async fn get_current_version(
    pool: &SqlitePool,
    document_id: &str,
) -> Result<Option<DocumentVersion>, AppError> {
    let version = sqlx::query_as::<_, DocumentVersion>(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions WHERE document_id = ? AND is_current = 1"
    ))
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    Ok(version)
}

/// 현재 버전이 아닌 버전을 삭제합니다.
///
/// 남은 버전의 번호는 바꾸지 않습니다. 이 버전을 참조하는 비교 요약과 분석은
/// 외래키 CASCADE로 함께 삭제됩니다.
///
/// # 에러
/// - `NotFound`: 문서에 해당 버전이 없음
/// - `InvalidOperation`: 현재 버전을 삭제하려 함
pub async fn delete_version(
    pool: &SqlitePool,
    document_id: &str,
    version_id: &str,
) -> Result<DocumentVersion, AppError> {
    let mut tx = pool.begin().await?;

    // 쓰기 잠금을 먼저 잡아 is_current 확인과 삭제 사이에 새 버전이 끼어들지 않게 합니다.
    let touched = sqlx::query(
        "UPDATE documents SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
    )
    .bind(document_id)
    .execute(&mut *tx)
    .await?;
    if touched.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    let version = sqlx::query_as::<_, DocumentVersion>(&format!(
        "SELECT {VERSION_COLUMNS} FROM document_versions WHERE id = ? AND document_id = ?"
    ))
    .bind(version_id)
    .bind(document_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound)?;

    if version.is_current {
        return Err(AppError::InvalidOperation(
            "the current version cannot be deleted".to_string(),
        ));
    }

    sqlx::query("DELETE FROM document_versions WHERE id = ?")
        .bind(version_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE documents SET version_count = version_count - 1 WHERE id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(version)
}

/// 버전의 승인 여부를 설정합니다.
pub async fn set_approval(
    pool: &SqlitePool,
    document_id: &str,
    version_id: &str,
    approved: bool,
) -> Result<Option<DocumentVersion>, AppError> {
    let result = sqlx::query(
        "UPDATE document_versions SET approved = ? WHERE id = ? AND document_id = ?",
    )
    .bind(approved)
    .bind(version_id)
    .bind(document_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_document_version(pool, document_id, version_id).await
}

/// 문서의 모든 버전이 가리키는 파일 URL (중복 제거). 문서 삭제 후 파일 정리에 사용합니다.
pub async fn list_file_urls(pool: &SqlitePool, document_id: &str) -> Result<Vec<String>, AppError> {
    let urls = sqlx::query_scalar(
        "SELECT DISTINCT file_url FROM document_versions WHERE document_id = ? ORDER BY file_url",
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;
    Ok(urls)
}
