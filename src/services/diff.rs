//! # 버전 diff 엔진
//!
//! 두 버전 내용의 문자 단위 통계(추가/삭제/유지)를 계산합니다.
//! 문자는 유니코드 스칼라 값(`char`) 기준으로 셉니다.
//!
//! ## 계산 예산
//! 문자 단위 diff 비용은 입력 길이의 제곱에 가깝게 늘어납니다.
//! - 한쪽이라도 `MAX_CHAR_DIFF_LEN`자를 넘으면 줄 단위로 비교하고,
//!   바뀐 줄의 문자 수를 셉니다.
//! - 모든 비교는 `DIFF_DEADLINE` 안에 끝납니다. 시간을 넘기면 나머지 구간은
//!   통째로 삭제+추가로 처리되어 최소는 아니지만 합계는 맞는 통계가 나옵니다.
//!
//! 캐시 키는 `(문서, 낮은 버전, 높은 버전)` 정규 순서입니다.
//! 버전은 불변이므로 캐시 항목은 버전이나 문서가 삭제될 때만 무효화됩니다.
//! 항목 수는 `MAX_CACHE_ENTRIES`를 넘지 않습니다.

use similar::{ChangeTag, TextDiff};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::AppError;
use crate::models::DiffStats;

/// 문자 단위로 비교하는 최대 길이 (한쪽 기준, 문자 수)
pub const MAX_CHAR_DIFF_LEN: usize = 8_000;

/// diff 알고리즘 한 번에 허용하는 시간
pub const DIFF_DEADLINE: Duration = Duration::from_secs(2);

/// 블로킹 스레드에서 diff 작업 하나를 기다리는 최대 시간
pub const DIFF_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// `DiffCache`가 보관하는 최대 항목 수
pub const MAX_CACHE_ENTRIES: usize = 4_096;

/// `old` → `new` 방향의 diff 통계 (문자 수)
///
/// 예산 안의 입력이면 유지 수는 최장 공통 부분열 길이이므로 인자 순서를 바꾸면
/// 유지 수는 같고 추가/삭제 수만 서로 바뀝니다.
/// 어느 경우든 `unchanged + removed`는 `old`의 길이, `unchanged + added`는 `new`의 길이입니다.
pub fn compute_diff(old: &str, new: &str) -> DiffStats {
    if old == new {
        return DiffStats {
            added: 0,
            removed: 0,
            unchanged: old.chars().count() as u64,
        };
    }

    let by_lines =
        old.chars().count() > MAX_CHAR_DIFF_LEN || new.chars().count() > MAX_CHAR_DIFF_LEN;
    let diff = if by_lines {
        tracing::debug!("Input over char diff limit, comparing by lines");
        TextDiff::configure().timeout(DIFF_DEADLINE).diff_lines(old, new)
    } else {
        TextDiff::configure().timeout(DIFF_DEADLINE).diff_chars(old, new)
    };
    let mut stats = DiffStats::default();

    for change in diff.iter_all_changes() {
        let len = change.value().chars().count() as u64;
        match change.tag() {
            ChangeTag::Equal => stats.unchanged += len,
            ChangeTag::Insert => stats.added += len,
            ChangeTag::Delete => stats.removed += len,
        }
    }

    stats
}

/// 줄 단위로 추가된 줄과 삭제된 줄을 최대 `limit`개씩 모읍니다. 빈 줄은 건너뜁니다.
pub fn changed_lines(old: &str, new: &str, limit: usize) -> (Vec<String>, Vec<String>) {
    let diff = TextDiff::configure().timeout(DIFF_DEADLINE).diff_lines(old, new);
    let mut added = Vec::new();
    let mut removed = Vec::new();

    for change in diff.iter_all_changes() {
        let line = change.value().trim();
        if line.is_empty() {
            continue;
        }
        match change.tag() {
            ChangeTag::Insert if added.len() < limit => added.push(line.to_string()),
            ChangeTag::Delete if removed.len() < limit => removed.push(line.to_string()),
            _ => {}
        }
    }

    (added, removed)
}

/// CPU를 쓰는 diff 작업을 블로킹 스레드풀에서 실행합니다.
///
/// `limit` 안에 끝나지 않으면 `AppError::Network`입니다.
pub async fn run_blocking<T, F>(limit: Duration, task: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(task)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AppError::Internal(format!("diff task failed: {}", e))),
        Err(_) => {
            tracing::warn!("Diff task did not finish within {:?}", limit);
            Err(AppError::Network(format!(
                "diff did not finish within {} seconds",
                limit.as_secs()
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiffKey {
    document_id: String,
    older_version_id: String,
    newer_version_id: String,
}

#[derive(Debug, Default)]
struct CacheEntries {
    stats: HashMap<DiffKey, DiffStats>,
    /// 삽입 순서. 한도를 넘으면 가장 오래된 키부터 버립니다.
    order: VecDeque<DiffKey>,
}

impl CacheEntries {
    fn retain(&mut self, keep: impl Fn(&DiffKey) -> bool) {
        self.stats.retain(|key, _| keep(key));
        self.order.retain(|key| keep(key));
    }
}

/// 정규 순서 키로 diff 통계를 보관하는 인메모리 캐시
///
/// clone하면 같은 저장소를 공유합니다.
#[derive(Debug, Clone)]
pub struct DiffCache {
    entries: Arc<RwLock<CacheEntries>>,
    capacity: usize,
}

impl Default for DiffCache {
    fn default() -> Self {
        Self::with_capacity(MAX_CACHE_ENTRIES)
    }
}

impl DiffCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(CacheEntries::default())),
            capacity: capacity.max(1),
        }
    }

    fn key(document_id: &str, older_version_id: &str, newer_version_id: &str) -> DiffKey {
        DiffKey {
            document_id: document_id.to_string(),
            older_version_id: older_version_id.to_string(),
            newer_version_id: newer_version_id.to_string(),
        }
    }

    pub fn get(
        &self,
        document_id: &str,
        older_version_id: &str,
        newer_version_id: &str,
    ) -> Option<DiffStats> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .stats
            .get(&Self::key(document_id, older_version_id, newer_version_id))
            .copied()
    }

    pub fn insert(
        &self,
        document_id: &str,
        older_version_id: &str,
        newer_version_id: &str,
        stats: DiffStats,
    ) {
        let key = Self::key(document_id, older_version_id, newer_version_id);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.stats.insert(key.clone(), stats).is_some() {
            return;
        }
        entries.order.push_back(key);

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.stats.remove(&oldest);
            }
        }
    }

    /// 이 버전이 들어간 항목을 모두 지웁니다.
    pub fn invalidate_version(&self, version_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key| {
            key.older_version_id != version_id && key.newer_version_id != version_id
        });
    }

    pub fn invalidate_document(&self, document_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key| key.document_id != document_id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn counts_characters_not_bytes() {
        let stats = compute_diff("계약서 초안", "계약서 최종본");
        assert_eq!(stats.unchanged, 4); // "계약서 "
        assert_eq!(stats.removed, 2); // "초안"
        assert_eq!(stats.added, 3); // "최종본"
    }

    #[test]
    fn identical_texts_have_no_changes() {
        let stats = compute_diff("same", "same");
        assert_eq!(
            stats,
            DiffStats {
                added: 0,
                removed: 0,
                unchanged: 4
            }
        );
    }

    #[test]
    fn diff_is_symmetric_up_to_direction() {
        let pairs = [
            ("The lessee shall pay rent monthly.", "The tenant shall pay rent quarterly."),
            ("", "brand new clause"),
            ("abcabba", "cbabac"),
        ];
        for (a, b) in pairs {
            let forward = compute_diff(a, b);
            let backward = compute_diff(b, a);
            assert_eq!(forward.unchanged, backward.unchanged);
            assert_eq!(forward.added, backward.removed);
            assert_eq!(forward.removed, backward.added);
        }
    }

    #[test]
    fn counts_add_up_to_input_lengths() {
        let (a, b) = ("indemnify and hold harmless", "hold harmless and defend");
        let stats = compute_diff(a, b);
        assert_eq!(stats.unchanged + stats.removed, a.chars().count() as u64);
        assert_eq!(stats.unchanged + stats.added, b.chars().count() as u64);
    }

    #[test]
    fn changed_lines_reports_both_sides() {
        let (added, removed) = changed_lines("a\nb\nc\n", "a\nB\nc\nd\n", 10);
        assert_eq!(added, vec!["B".to_string(), "d".to_string()]);
        assert_eq!(removed, vec!["b".to_string()]);
    }

    #[test]
    fn cache_invalidation_by_version_and_document() {
        let cache = DiffCache::new();
        let stats = DiffStats::default();
        cache.insert("doc-1", "v1", "v2", stats);
        cache.insert("doc-1", "v2", "v3", stats);
        cache.insert("doc-2", "w1", "w2", stats);

        cache.invalidate_version("v1");
        assert!(cache.get("doc-1", "v1", "v2").is_none());
        assert!(cache.get("doc-1", "v2", "v3").is_some());

        cache.invalidate_document("doc-1");
        assert_eq!(cache.len(), 1);
        assert!(cache.get("doc-2", "w1", "w2").is_some());
    }

    /// 시드 고정 선형 합동 생성기로 만든 a–z 문자열
    fn pseudo_random_text(len: usize, mut seed: u64) -> String {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (b'a' + ((seed >> 33) % 26) as u8) as char
            })
            .collect()
    }

    #[test]
    fn large_single_line_inputs_finish_within_budget() {
        let old = pseudo_random_text(80_000, 1);
        let new = pseudo_random_text(80_000, 2);

        let started = Instant::now();
        let stats = compute_diff(&old, &new);
        assert!(started.elapsed() < DIFF_DEADLINE * 3, "took {:?}", started.elapsed());

        assert_eq!(stats.unchanged + stats.removed, 80_000);
        assert_eq!(stats.unchanged + stats.added, 80_000);
    }

    #[test]
    fn large_multi_line_inputs_finish_within_budget() {
        let old: String = (0..20_000u64)
            .map(|i| format!("clause {} reads {}\n", i, i * 7919 % 10_007))
            .collect();
        let new: String = (0..20_000u64)
            .map(|i| format!("clause {} reads {}\n", i, i * 104_729 % 10_007))
            .collect();

        let started = Instant::now();
        let stats = compute_diff(&old, &new);
        assert!(started.elapsed() < DIFF_DEADLINE * 3, "took {:?}", started.elapsed());

        assert_eq!(stats.unchanged + stats.removed, old.chars().count() as u64);
        assert_eq!(stats.unchanged + stats.added, new.chars().count() as u64);
        assert!(stats.unchanged > 0);
    }

    #[tokio::test]
    async fn slow_diff_task_becomes_a_network_error() {
        let result = run_blocking(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300))
        })
        .await;
        assert!(matches!(result, Err(AppError::Network(_))));

        let stats = run_blocking(DIFF_TASK_TIMEOUT, || compute_diff("a", "b"))
            .await
            .unwrap();
        assert_eq!((stats.added, stats.removed), (1, 1));
    }

    #[test]
    fn cache_drops_oldest_entries_over_capacity() {
        let cache = DiffCache::with_capacity(2);
        let stats = DiffStats::default();
        cache.insert("doc-1", "v1", "v2", stats);
        cache.insert("doc-1", "v1", "v3", stats);
        cache.insert("doc-1", "v1", "v2", stats);
        assert_eq!(cache.len(), 2);

        cache.insert("doc-1", "v2", "v3", stats);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("doc-1", "v1", "v2").is_none());
        assert!(cache.get("doc-1", "v1", "v3").is_some());
        assert!(cache.get("doc-1", "v2", "v3").is_some());
    }
}
