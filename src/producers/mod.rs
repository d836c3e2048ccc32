//! 阶段生产者：每个阶段一个异步 trait
//!
//! 生产者只拿到 `&Job` 与任务的取消令牌，返回自己的产物；写入 Job 与推进 phase 只由 Orchestrator 完成。

pub mod audio;
pub mod edit;
pub mod script;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{AudioTrack, Job, Script, StageError, VisualPlan};

pub use audio::SilentAudio;
pub use edit::ManifestEditor;
pub use script::{BriefScriptProducer, LlmScriptProducer};

#[async_trait]
pub trait ScriptProducer: Send + Sync {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<Script, StageError>;
}

#[async_trait]
pub trait VisualProducer: Send + Sync {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<VisualPlan, StageError>;
}

#[async_trait]
pub trait AudioProducer: Send + Sync {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<AudioTrack, StageError>;
}

/// 剪辑：有序场景 + 音轨 → 成片路径
#[async_trait]
pub trait EditProducer: Send + Sync {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<PathBuf, StageError>;
}
