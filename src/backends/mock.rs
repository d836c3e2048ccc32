//! Mock 素材后端（离线运行与测试用，不访问网络也不写文件）

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backends::{BackendError, GeneratedImage, MediaGenerator, MediaSearch, SearchHit};

/// Mock 检索：返回 media_dir 下的虚拟路径；可配置为失败或延迟
#[derive(Debug, Default)]
pub struct MockSearch {
    media_dir: PathBuf,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            ..Self::default()
        }
    }

    /// 每次调用都失败
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaSearch for MockSearch {
    fn name(&self) -> &str {
        "mock_search"
    }

    async fn search(&self, keywords: &str) -> Result<SearchHit, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut q) = self.queries.lock() {
            q.push(keywords.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(BackendError::Request("mock search unavailable".to_string()));
        }
        Ok(SearchHit {
            media_id: format!("mock-{n}"),
            url: format!("mock://search/{n}"),
            local_path: self.media_dir.join(format!("mock_search_{n}.mp4")),
            width: 1920,
            height: 1080,
            duration_secs: 10.0,
        })
    }
}

/// Mock 生成
#[derive(Debug, Default)]
pub struct MockGenerator {
    media_dir: PathBuf,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock_generator"
    }

    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(BackendError::Request("mock generator unavailable".to_string()));
        }
        Ok(GeneratedImage {
            local_path: self.media_dir.join(format!("mock_generated_{n}.png")),
            prompt_used: prompt.to_string(),
        })
    }
}
