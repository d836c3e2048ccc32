//! HTTP 素材后端
//!
//! - StockVideoSearch：Pexels 兼容的视频检索 API（GET /videos/search），取第一条结果中不超过 1080p 的最大文件并下载
//! - HttpImageGenerator：POST JSON `{"prompt", "width", "height"}`，响应体即图片字节
//!
//! 两者都只把文件写到 media_dir，不做任何转码。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::backends::{BackendError, GeneratedImage, MediaGenerator, MediaSearch, SearchHit};

const USER_AGENT: &str = concat!("clipflow/", env!("CARGO_PKG_VERSION"));
/// 下载的视频文件最大宽度
const MAX_VIDEO_WIDTH: u32 = 1920;

#[derive(Debug, Deserialize)]
struct VideoSearchResponse {
    #[serde(default)]
    videos: Vec<VideoEntry>,
}

#[derive(Debug, Deserialize)]
struct VideoEntry {
    id: u64,
    url: String,
    #[serde(default)]
    duration: f32,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

async fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BackendError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Pexels 兼容的视频检索
pub struct StockVideoSearch {
    client: Client,
    api_base: String,
    api_key: String,
    per_page: u32,
    media_dir: PathBuf,
}

impl StockVideoSearch {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        per_page: u32,
        timeout_secs: u64,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: build_client(timeout_secs),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            per_page: per_page.max(1),
            media_dir: media_dir.into(),
        }
    }

    fn pick_file(entry: &VideoEntry) -> Option<&VideoFile> {
        entry
            .video_files
            .iter()
            .filter(|f| f.width.unwrap_or(0) <= MAX_VIDEO_WIDTH)
            .max_by_key(|f| f.width.unwrap_or(0))
    }
}

#[async_trait]
impl MediaSearch for StockVideoSearch {
    fn name(&self) -> &str {
        "stock_video"
    }

    async fn search(&self, keywords: &str) -> Result<SearchHit, BackendError> {
        let per_page = self.per_page.to_string();
        let resp = self
            .client
            .get(format!("{}/videos/search", self.api_base))
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", keywords),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BackendError::Request(format!("HTTP {}", resp.status())));
        }
        let body: VideoSearchResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let (entry, file) = body
            .videos
            .iter()
            .find_map(|v| Self::pick_file(v).map(|f| (v, f)))
            .ok_or_else(|| BackendError::NoResults(keywords.to_string()))?;

        let bytes = self.client.get(&file.link).send().await?.error_for_status()?.bytes().await?;
        let local_path = write_file(&self.media_dir, &format!("stock_{}.mp4", entry.id), &bytes).await?;
        tracing::info!(media_id = entry.id, path = %local_path.display(), "stock video downloaded");

        Ok(SearchHit {
            media_id: entry.id.to_string(),
            url: entry.url.clone(),
            local_path,
            width: file.width.unwrap_or(0),
            height: file.height.unwrap_or(0),
            duration_secs: entry.duration,
        })
    }
}

/// 通用 HTTP 图像生成端点
pub struct HttpImageGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    width: u32,
    height: u32,
    media_dir: PathBuf,
}

impl HttpImageGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: build_client(timeout_secs),
            endpoint: endpoint.into(),
            api_key,
            width: 1920,
            height: 1080,
            media_dir: media_dir.into(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[async_trait]
impl MediaGenerator for HttpImageGenerator {
    fn name(&self) -> &str {
        "http_image"
    }

    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, BackendError> {
        let mut req = self.client.post(&self.endpoint).json(&serde_json::json!({
            "prompt": prompt,
            "width": self.width,
            "height": self.height,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(BackendError::Request(format!("HTTP {}", resp.status())));
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(BackendError::InvalidResponse("empty image body".to_string()));
        }
        let file_name = format!("generated_{}.png", uuid::Uuid::new_v4());
        let local_path = write_file(&self.media_dir, &file_name, &bytes).await?;

        Ok(GeneratedImage {
            local_path,
            prompt_used: prompt.to_string(),
        })
    }
}
