//! 취소 가능한 지연 작업

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// `delay` 후에 future를 실행하는 tokio 작업
///
/// `cancel()`하거나 값을 drop하면 아직 실행 중인 작업이 중단(abort)됩니다.
/// 타이머를 다시 시작하려면 새 `DelayedTask`로 덮어쓰면 됩니다.
#[derive(Debug)]
pub struct DelayedTask {
    handle: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// 실행을 마쳤거나 취소되었으면 true
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
