//! 后端执行器
//!
//! 持有检索 / 生成两个适配器与统一超时，每次调用都受任务取消令牌约束；
//! 超时或取消映射为 BackendError，每次调用输出结构化审计日志（JSON）。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::backends::{BackendError, GeneratedImage, MediaGenerator, MediaSearch, SearchHit};
use crate::core::task_scheduler::{run_guarded, GuardError};

pub struct BackendExecutor {
    search: Arc<dyn MediaSearch>,
    generator: Arc<dyn MediaGenerator>,
    timeout: Duration,
}

impl BackendExecutor {
    pub fn new(
        search: Arc<dyn MediaSearch>,
        generator: Arc<dyn MediaGenerator>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            search,
            generator,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn search(
        &self,
        keywords: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchHit, BackendError> {
        self.guarded(self.search.name(), keywords, cancel, self.search.search(keywords))
            .await
    }

    pub async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage, BackendError> {
        self.guarded(self.generator.name(), prompt, cancel, self.generator.generate(prompt))
            .await
    }

    async fn guarded<T, F>(
        &self,
        backend: &str,
        input: &str,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let start = Instant::now();
        let result = match run_guarded(self.timeout, cancel, fut).await {
            Ok(inner) => inner,
            Err(GuardError::Timeout(d)) => Err(BackendError::Timeout(format!("{backend} after {d:?}"))),
            Err(GuardError::Cancelled) => Err(BackendError::Cancelled),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(BackendError::Timeout(_)) => "timeout",
            Err(BackendError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "backend_audit",
            "backend": backend,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "input_preview": input_preview(input),
        });
        tracing::info!(audit = %audit, "backend");

        result
    }
}

fn input_preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}
