//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置回复；队列耗尽后重复最后一条。可配置为始终失败或延迟返回，
//! 用于验证路由回退、工具选择升级与超时处理。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient, LlmError};

/// Mock 客户端：预置回复队列 + 调用计数
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    last: Mutex<Option<Result<String, LlmError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    /// 依次返回给定文本
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            ..Self::default()
        }
    }

    /// 每次调用都返回同一个错误
    pub fn failing(err: LlmError) -> Self {
        Self {
            last: Mutex::new(Some(Err(err))),
            ..Self::default()
        }
    }

    /// 每次调用前先等待（用于超时测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到的请求副本（断言 prompt 内容用）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_response(&self) -> Result<String, LlmError> {
        let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(_) => return Err(LlmError::ApiError("mock poisoned".to_string())),
        };
        match next {
            Some(r) => {
                *last = Some(r.clone());
                r
            }
            None => last.clone().unwrap_or(Err(LlmError::EmptyResponse)),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response()
    }

    fn model(&self) -> &str {
        "mock"
    }
}
