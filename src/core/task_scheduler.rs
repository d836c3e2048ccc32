//! 任务调度：场景并发池 + 外部调用守卫
//!
//! 视觉阶段内各场景相互独立，可以并发解析，用 Semaphore 限制同时进行的场景数；
//! 所有外部网络调用（LLM、素材检索、素材生成）都经过 run_guarded，带超时并响应任务级取消。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// 守卫失败原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// 在超时与取消令牌的约束下运行 future；取消优先
pub async fn run_guarded<F>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, GuardError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GuardError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => res.map_err(|_| GuardError::Timeout(timeout)),
    }
}

/// 场景并发调度器
#[derive(Clone, Debug)]
pub struct TaskScheduler {
    scene_semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl TaskScheduler {
    pub fn new(max_concurrent_scenes: usize) -> Self {
        let max_concurrent = max_concurrent_scenes.max(1);
        Self {
            scene_semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// 获取场景执行许可；信号量从不关闭，失败时返回 None 由调用方串行执行
    pub async fn acquire_scene(&self) -> Option<OwnedSemaphorePermit> {
        self.scene_semaphore.clone().acquire_owned().await.ok()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(4)
    }
}
