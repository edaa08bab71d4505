//! # 문서 메모 자동 저장
//!
//! ## 상태 전이
//! ```text
//! Idle/Saved ──edit()──▶ Dirty ──(debounce 경과)──▶ Saving ──성공──▶ Saved ──(display 경과)──▶ Idle
//!                          ▲  └─ 다시 edit() → 타이머 재시작      └──실패──▶ Error (다음 edit/save_now까지 유지)
//!                          └──────────────── 저장 중 edit() ─────────┘
//! ```
//!
//! 디바운스 창 안의 편집은 마지막 값 하나로 합쳐져 한 번만 저장됩니다.
//! 저장 중에 새 편집이 들어오면 그 저장이 끝나도 `Saved`로 바뀌지 않습니다.
//!
//! 상태는 `tokio::sync::watch` 채널로 공개되며, 타이머는 `DelayedTask`가 담당합니다.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::db;
use crate::error::AppError;
use crate::services::timer::DelayedTask;

/// 메모 저장 대상
#[async_trait]
pub trait NotesSink: Send + Sync {
    /// 같은 내용으로 반복 호출해도 안전해야 합니다.
    async fn save_notes(&self, document_id: &str, text: &str) -> Result<(), AppError>;
}

/// `documents.notes` 컬럼에 저장
#[derive(Clone)]
pub struct SqliteNotesSink {
    pool: SqlitePool,
}

impl SqliteNotesSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotesSink for SqliteNotesSink {
    async fn save_notes(&self, document_id: &str, text: &str) -> Result<(), AppError> {
        if db::update_notes(&self.pool, document_id, text).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Dirty,
    Saving,
    Saved,
    Error(String),
}

#[derive(Debug, Clone, Copy)]
pub struct AutosaveConfig {
    /// 마지막 편집 후 저장까지 기다리는 시간
    pub debounce: Duration,
    /// `Saved` 표시를 유지하는 시간
    pub saved_display: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            saved_display: Duration::from_millis(2000),
        }
    }
}

struct Draft {
    text: String,
    /// 마지막으로 저장에 성공한 값
    persisted: String,
    /// 편집마다 1씩 증가
    generation: u64,
    persisted_generation: u64,
    /// 지금 sink에 보내는 중인 generation
    in_flight: Option<u64>,
    debounce: Option<DelayedTask>,
    display: Option<DelayedTask>,
}

struct Inner {
    document_id: String,
    sink: Arc<dyn NotesSink>,
    config: AutosaveConfig,
    state: watch::Sender<SaveState>,
    draft: Mutex<Draft>,
}

/// 문서 하나의 메모 편집 세션
///
/// clone하면 같은 세션을 공유합니다. 마지막 핸들이 drop되면 대기 중인 타이머는
/// 아무 것도 하지 않고 끝납니다.
#[derive(Clone)]
pub struct Autosaver {
    inner: Arc<Inner>,
}

impl Autosaver {
    /// `initial`은 이미 저장된 메모 값입니다.
    pub fn new(
        document_id: impl Into<String>,
        initial: impl Into<String>,
        sink: Arc<dyn NotesSink>,
        config: AutosaveConfig,
    ) -> Self {
        let initial = initial.into();
        let (state, _) = watch::channel(SaveState::Idle);

        Self {
            inner: Arc::new(Inner {
                document_id: document_id.into(),
                sink,
                config,
                state,
                draft: Mutex::new(Draft {
                    text: initial.clone(),
                    persisted: initial,
                    generation: 0,
                    persisted_generation: 0,
                    in_flight: None,
                    debounce: None,
                    display: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Draft> {
        self.inner.draft.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SaveState) {
        self.inner.state.send_replace(state);
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SaveState {
        self.inner.state.borrow().clone()
    }

    pub fn draft(&self) -> String {
        self.lock().text.clone()
    }

    /// 저장할 변경이 있는지. 없으면 수동 저장 버튼을 비활성화합니다.
    pub fn can_save(&self) -> bool {
        let draft = self.lock();
        draft.text != draft.persisted
    }

    /// 편집 내용을 반영하고 디바운스 타이머를 다시 시작합니다.
    pub fn edit(&self, text: impl Into<String>) {
        let weak = self.downgrade();
        let mut draft = self.lock();
        draft.text = text.into();
        draft.generation += 1;
        draft.display = None;

        // 이전 타이머는 덮어쓰면서 drop → abort
        draft.debounce = Some(DelayedTask::spawn(self.inner.config.debounce, async move {
            if let Some(saver) = Self::upgrade(&weak) {
                // 저장은 별도 작업에서 실행해 다음 edit()의 타이머 교체에 영향받지 않게 합니다.
                tokio::spawn(async move {
                    let _ = saver.flush().await;
                });
            }
        }));
        drop(draft);

        self.set_state(SaveState::Dirty);
    }

    /// 대기 중인 타이머를 취소하고 즉시 저장합니다.
    ///
    /// # 반환값
    /// - `Ok(true)`: 저장함
    /// - `Ok(false)`: 마지막 저장 값과 같거나, 같은 편집본을 이미 저장하는 중이라 건너뜀
    pub async fn save_now(&self) -> Result<bool, AppError> {
        self.lock().debounce = None;
        self.flush().await
    }

    async fn flush(&self) -> Result<bool, AppError> {
        let (text, generation) = {
            let mut draft = self.lock();
            draft.debounce = None;
            if draft.text == draft.persisted {
                drop(draft);
                if self.state() == SaveState::Dirty {
                    self.set_state(SaveState::Idle);
                }
                return Ok(false);
            }
            if draft.in_flight == Some(draft.generation) {
                return Ok(false);
            }
            draft.in_flight = Some(draft.generation);
            (draft.text.clone(), draft.generation)
        };

        self.set_state(SaveState::Saving);
        let result = self
            .inner
            .sink
            .save_notes(&self.inner.document_id, &text)
            .await;

        let mut draft = self.lock();
        let latest = draft.generation == generation;
        if draft.in_flight == Some(generation) {
            draft.in_flight = None;
        }

        match result {
            Ok(()) => {
                if generation >= draft.persisted_generation {
                    draft.persisted = text;
                    draft.persisted_generation = generation;
                }
                if latest {
                    let weak = self.downgrade();
                    draft.display = Some(DelayedTask::spawn(
                        self.inner.config.saved_display,
                        async move {
                            if let Some(saver) = Self::upgrade(&weak) {
                                let current = saver.lock().generation;
                                if current == generation && saver.state() == SaveState::Saved {
                                    saver.set_state(SaveState::Idle);
                                }
                            }
                        },
                    ));
                    drop(draft);
                    self.set_state(SaveState::Saved);
                    tracing::debug!(document_id = %self.inner.document_id, "Notes saved");
                }
                Ok(true)
            }
            Err(e) => {
                drop(draft);
                if latest {
                    self.set_state(SaveState::Error(e.to_string()));
                }
                tracing::warn!(document_id = %self.inner.document_id, "Notes autosave failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 호출 내용을 기록하는 sink. `delay`만큼 걸려서 저장합니다.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
        fail: AtomicBool,
        delay: Duration,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotesSink for RecordingSink {
        async fn save_notes(&self, _document_id: &str, text: &str) -> Result<(), AppError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.calls.lock().unwrap().push(text.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Network("offline".to_string()));
            }
            Ok(())
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn edits_within_the_window_collapse_into_one_save() {
        let sink = Arc::new(RecordingSink::default());
        let saver = Autosaver::new("doc-1", "", sink.clone(), AutosaveConfig::default());
        let mut states = saver.subscribe();

        saver.edit("Call");
        tokio::time::sleep(ms(500)).await;
        saver.edit("Call client");
        tokio::time::sleep(ms(500)).await;
        saver.edit("Call client Monday");
        assert_eq!(saver.state(), SaveState::Dirty);

        tokio::time::sleep(ms(1999)).await;
        assert!(sink.calls().is_empty());

        states.wait_for(|s| *s == SaveState::Saved).await.unwrap();
        assert_eq!(sink.calls(), vec!["Call client Monday".to_string()]);
        assert!(!saver.can_save());

        states.wait_for(|s| *s == SaveState::Idle).await.unwrap();
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_of_unchanged_text_is_a_no_op() {
        let sink = Arc::new(RecordingSink::default());
        let saver = Autosaver::new("doc-1", "persisted", sink.clone(), AutosaveConfig::default());

        assert!(!saver.can_save());
        assert!(!saver.save_now().await.unwrap());
        assert!(sink.calls().is_empty());

        saver.edit("changed");
        assert!(saver.save_now().await.unwrap());
        assert!(!saver.save_now().await.unwrap());
        assert_eq!(sink.calls(), vec!["changed".to_string()]);

        // 수동 저장이 디바운스 타이머를 취소했으므로 추가 저장은 없습니다.
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_save_does_not_report_saved() {
        let sink = Arc::new(RecordingSink {
            delay: ms(1000),
            ..Default::default()
        });
        let saver = Autosaver::new("doc-1", "", sink.clone(), AutosaveConfig::default());
        let mut states = saver.subscribe();

        saver.edit("draft one");
        // t=2000 저장 시작, t=3000 완료 예정
        tokio::time::sleep(ms(2500)).await;
        assert_eq!(saver.state(), SaveState::Saving);
        saver.edit("draft two");

        tokio::time::sleep(ms(600)).await;
        assert_eq!(sink.calls(), vec!["draft one".to_string()]);
        assert_eq!(saver.state(), SaveState::Dirty);

        states.wait_for(|s| *s == SaveState::Saved).await.unwrap();
        assert_eq!(
            sink.calls(),
            vec!["draft one".to_string(), "draft two".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_skips_a_draft_already_being_saved() {
        let sink = Arc::new(RecordingSink {
            delay: ms(1000),
            ..Default::default()
        });
        let saver = Autosaver::new("doc-1", "", sink.clone(), AutosaveConfig::default());
        let mut states = saver.subscribe();

        saver.edit("hearing moved to Friday");
        // t=2000 디바운스 저장 시작, t=3000 완료 예정
        tokio::time::sleep(ms(2500)).await;
        assert_eq!(saver.state(), SaveState::Saving);

        assert!(!saver.save_now().await.unwrap());

        states.wait_for(|s| *s == SaveState::Saved).await.unwrap();
        assert_eq!(sink.calls(), vec!["hearing moved to Friday".to_string()]);
        assert!(!saver.can_save());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stays_in_error_until_next_edit() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, Ordering::SeqCst);
        let saver = Autosaver::new("doc-1", "", sink.clone(), AutosaveConfig::default());
        let mut states = saver.subscribe();

        saver.edit("unsaved");
        states
            .wait_for(|s| matches!(s, SaveState::Error(_)))
            .await
            .unwrap();

        tokio::time::sleep(ms(10_000)).await;
        assert!(matches!(saver.state(), SaveState::Error(_)));
        assert_eq!(sink.calls().len(), 1);
        assert!(saver.can_save());

        sink.fail.store(false, Ordering::SeqCst);
        assert!(saver.save_now().await.unwrap());
        assert_eq!(saver.state(), SaveState::Saved);
    }

    #[tokio::test]
    async fn sqlite_sink_overwrites_document_notes() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        let sink = SqliteNotesSink::new(pool.clone());
        assert!(matches!(
            sink.save_notes("missing", "x").await,
            Err(AppError::NotFound)
        ));
    }
}
