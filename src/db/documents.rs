//! # 문서 데이터베이스 쿼리 모듈
//!
//! `documents` 테이블에 대한 CRUD 쿼리 함수들이 정의되어 있습니다.
//!
//! 모든 함수는 `async`이며 `SqlitePool`을 받아 데이터베이스와 상호작용합니다.
//! 에러 발생 시 `AppError`를 반환합니다.

use crate::db::versions::insert_current_version;
use crate::error::AppError;
use crate::models::*;
use sqlx::SqlitePool;

const DOCUMENT_COLUMNS: &str = "id, name, case_id, client_id, category, status, file_url, \
     file_size, mime_type, version_count, last_version_number, is_starred, notes, created_by, \
     created_at, updated_at";

/// 목록 조회 기본/최대 페이지 크기
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 필터에 맞는 문서를 페이지 단위로 조회합니다.
///
/// 즐겨찾기(starred) 문서가 먼저, 그 다음 수정일 내림차순으로 정렬합니다.
///
/// # 매개변수
/// - `filter`: 사건/의뢰인/분류/상태/즐겨찾기/이름 검색 조건과 페이지 정보
///
/// # 반환값
/// `DocumentPage { documents, pagination }`
pub async fn list_documents(
    pool: &SqlitePool,
    filter: &DocumentFilter,
) -> Result<DocumentPage, AppError> {
    // ── 동적 WHERE 절 구성 ──
    // 필터에 값이 있는 조건만 SQL에 포함하고, 바인딩 값은 순서대로 모아둡니다.
    let mut conditions: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(case_id) = &filter.case_id {
        conditions.push("case_id = ?");
        bindings.push(case_id.clone());
    }
    if let Some(client_id) = &filter.client_id {
        conditions.push("client_id = ?");
        bindings.push(client_id.clone());
    }
    if let Some(category) = &filter.category {
        conditions.push("category = ?");
        bindings.push(category.clone());
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        bindings.push(status.as_str().to_string());
    }
    if let Some(starred) = filter.starred {
        conditions.push(if starred { "is_starred = 1" } else { "is_starred = 0" });
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // SQLite의 LIKE는 ASCII 범위에서 대소문자를 구분하지 않습니다.
        conditions.push("name LIKE ? ESCAPE '\\'");
        bindings.push(format!("%{}%", escape_like(search)));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = i64::from(page - 1) * i64::from(limit);

    let count_sql = format!("SELECT COUNT(*) FROM documents {where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(pool).await?;

    let select_sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents {where_clause} \
         ORDER BY is_starred DESC, updated_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut select_query = sqlx::query_as::<_, Document>(&select_sql);
    for binding in &bindings {
        select_query = select_query.bind(binding);
    }
    let documents = select_query
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(DocumentPage {
        documents,
        pagination: Pagination::new(page, limit, total),
    })
}

/// LIKE 패턴의 와일드카드(`%`, `_`)와 이스케이프 문자를 그대로 검색하도록 처리합니다.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// ID로 단일 문서를 조회합니다.
///
/// # 반환값
/// - `Ok(Some(Document))`: 문서를 찾은 경우
/// - `Ok(None)`: 해당 ID의 문서가 없는 경우
pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>, AppError> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(doc)
}

/// 새 문서와 버전 1을 하나의 트랜잭션으로 생성합니다.
///
/// 문서 행만 생기고 버전이 없는 상태는 커밋되지 않습니다.
///
/// # 매개변수
/// - `name`: 검증이 끝난 문서 이름
/// - `author_id`: 생성자(버전 1의 작성자)
/// - `file`: 업로드가 끝난 파일 참조
pub async fn create_document(
    pool: &SqlitePool,
    req: &CreateDocumentRequest,
    name: &str,
    author_id: &str,
    file: &FileRef,
) -> Result<(Document, DocumentVersion), AppError> {
    let id = uuid::Uuid::now_v7().to_string();
    let version_id = uuid::Uuid::now_v7().to_string();
    let status = req.status.unwrap_or_default();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents
            (id, name, case_id, client_id, category, status, file_url, file_size, mime_type, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(&req.case_id)
    .bind(&req.client_id)
    .bind(&req.category)
    .bind(status.as_str())
    .bind(&file.url)
    .bind(file.size)
    .bind(&file.mime_type)
    .bind(author_id)
    .execute(&mut *tx)
    .await?;

    let change_note = req.change_note.as_deref().unwrap_or("Initial upload");
    let version = insert_current_version(&mut *tx, &version_id, &id, author_id, file, change_note)
        .await?
        .ok_or(AppError::Internal("Failed to create initial version".to_string()))?;

    let document = sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
    ))
    .bind(&id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((document, version))
}

/// 문서 메타데이터를 수정합니다 (부분 업데이트 - PATCH 방식).
///
/// 요청에 포함된 필드만 업데이트하고, 나머지는 그대로 유지합니다.
///
/// # 반환값
/// - `Ok(Some(Document))`: 수정 성공
/// - `Ok(None)`: 해당 ID의 문서가 없음
pub async fn update_document(
    pool: &SqlitePool,
    id: &str,
    req: &UpdateDocumentRequest,
) -> Result<Option<Document>, AppError> {
    let mut query =
        String::from("UPDATE documents SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
    let mut bindings: Vec<&str> = Vec::new();

    if let Some(name) = &req.name {
        query.push_str(", name = ?");
        bindings.push(name.as_str());
    }

    // Some(None)은 명시적인 null → 연결 해제
    for (column, value) in [
        ("case_id", &req.case_id),
        ("client_id", &req.client_id),
        ("category", &req.category),
    ] {
        match value {
            Some(Some(v)) => {
                query.push_str(&format!(", {column} = ?"));
                bindings.push(v.as_str());
            }
            Some(None) => query.push_str(&format!(", {column} = NULL")),
            None => {}
        }
    }

    if let Some(status) = req.status {
        query.push_str(", status = ?");
        bindings.push(status.as_str());
    }

    if let Some(is_starred) = req.is_starred {
        query.push_str(if is_starred { ", is_starred = 1" } else { ", is_starred = 0" });
    }

    query.push_str(" WHERE id = ?");
    bindings.push(id);

    let mut query_builder = sqlx::query(&query);
    for binding in bindings {
        query_builder = query_builder.bind(binding);
    }

    let result = query_builder.execute(pool).await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_document(pool, id).await
}

/// 문서를 삭제합니다. 버전, 비교 요약, 분석은 CASCADE로 함께 삭제됩니다.
///
/// # 반환값
/// - `Ok(true)`: 삭제 성공
/// - `Ok(false)`: 해당 ID의 문서가 없음
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// 문서 메모를 덮어씁니다. 같은 내용으로 여러 번 호출해도 결과가 같습니다.
pub async fn update_notes(pool: &SqlitePool, id: &str, notes: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE documents SET notes = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
    )
    .bind(notes)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        crate::db::connect("sqlite::memory:").await.unwrap()
    }

    fn file(name: &str) -> FileRef {
        FileRef {
            url: format!("memory://{name}"),
            size: 12,
            mime_type: "text/plain".to_string(),
            original_file_name: name.to_string(),
            checksum: "abc".to_string(),
        }
    }

    async fn create(pool: &SqlitePool, name: &str, case_id: Option<&str>) -> Document {
        let req = CreateDocumentRequest {
            case_id: case_id.map(str::to_string),
            ..Default::default()
        };
        create_document(pool, &req, name, "user-1", &file(name))
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn created_document_starts_with_one_current_version() {
        let pool = pool().await;
        let req = CreateDocumentRequest::default();
        let (doc, version) = create_document(&pool, &req, "Lease", "user-1", &file("lease.txt"))
            .await
            .unwrap();

        assert_eq!(doc.version_count, 1);
        assert_eq!(doc.last_version_number, 1);
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(version.version_number, 1);
        assert!(version.is_current);
        assert_eq!(version.change_note, "Initial upload");
        assert_eq!(doc.file_url, version.file_url);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let pool = pool().await;
        for i in 0..3 {
            create(&pool, &format!("Brief {i}"), Some("case-a")).await;
        }
        create(&pool, "Memo", Some("case-b")).await;

        let filter = DocumentFilter {
            case_id: Some("case-a".to_string()),
            limit: Some(2),
            ..Default::default()
        };
        let page = list_documents(&pool, &filter).await.unwrap();
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.total_pages, 2);

        let search = DocumentFilter {
            search: Some("mem".to_string()),
            ..Default::default()
        };
        let page = list_documents(&pool, &search).await.unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0].name, "Memo");
    }

    #[tokio::test]
    async fn starred_documents_sort_first() {
        let pool = pool().await;
        let first = create(&pool, "First", None).await;
        create(&pool, "Second", None).await;

        let req = UpdateDocumentRequest {
            is_starred: Some(true),
            ..Default::default()
        };
        update_document(&pool, &first.id, &req).await.unwrap();

        let page = list_documents(&pool, &DocumentFilter::default()).await.unwrap();
        assert_eq!(page.documents[0].id, first.id);
        assert!(page.documents[0].is_starred);
    }

    #[tokio::test]
    async fn update_can_clear_a_reference() {
        let pool = pool().await;
        let doc = create(&pool, "Pleading", Some("case-a")).await;

        let req: UpdateDocumentRequest =
            serde_json::from_str(r#"{ "case_id": null, "status": "review" }"#).unwrap();
        let updated = update_document(&pool, &doc.id, &req).await.unwrap().unwrap();

        assert_eq!(updated.case_id, None);
        assert_eq!(updated.status, DocumentStatus::Review);
        assert!(update_document(&pool, "missing", &req).await.unwrap().is_none());
    }

    #[test]
    fn like_wildcards_are_matched_literally() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
