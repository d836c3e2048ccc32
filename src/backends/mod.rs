//! 素材后端适配器（外部协作者）
//!
//! 只约定调用接口：检索库存视频、根据 prompt 生成图片。核心决策层通过 trait 使用它们，
//! 具体实现有 HTTP 版（http）与离线/测试用的 Mock 版（mock）。

pub mod http;
pub mod mock;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{HttpImageGenerator, StockVideoSearch};
pub use mock::{MockGenerator, MockSearch};

/// 后端调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("No results for {0:?}")]
    NoResults(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else {
            BackendError::Request(e.to_string())
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e.to_string())
    }
}

/// 检索结果（已下载到本地）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub media_id: String,
    pub url: String,
    pub local_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f32,
}

/// 生成结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub local_path: PathBuf,
    pub prompt_used: String,
}

/// 库存素材检索
#[async_trait]
pub trait MediaSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, keywords: &str) -> Result<SearchHit, BackendError>;
}

/// 图像生成
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, BackendError>;
}
