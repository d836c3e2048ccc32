//! 剪辑生产者：把有序场景与音轨写成剪辑清单（JSON），返回清单路径作为成片路径
//!
//! 清单位于 `{output_dir}/{job_id}/edit_manifest.json`，供下游渲染器使用。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{AudioTrack, Job, StageError};
use crate::producers::EditProducer;
use crate::visual::MediaKind;

#[derive(Debug, Serialize)]
struct ManifestScene<'a> {
    scene_number: u32,
    media_path: Option<&'a PathBuf>,
    overlay_path: Option<&'a PathBuf>,
    media_kind: MediaKind,
    duration_secs: f32,
    narration: &'a str,
}

#[derive(Debug, Serialize)]
struct EditManifest<'a> {
    job_id: &'a str,
    title: &'a str,
    scenes: Vec<ManifestScene<'a>>,
    audio: &'a AudioTrack,
}

pub struct ManifestEditor {
    output_dir: PathBuf,
}

impl ManifestEditor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl EditProducer for ManifestEditor {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<PathBuf, StageError> {
        let (Some(script), Some(plan), Some(audio)) = (job.script(), job.visual_plan(), job.audio()) else {
            return Err(StageError::InvalidOutput(
                "edit stage needs script, visual plan and audio".to_string(),
            ));
        };

        // 场景文本来自脚本，素材来自视觉计划；二者都按 scene_number 对齐
        let scenes = plan
            .scenes
            .iter()
            .map(|v| {
                let scene = script.scenes.iter().find(|s| s.scene_number == v.scene_number);
                ManifestScene {
                    scene_number: v.scene_number,
                    media_path: v.media_path.as_ref(),
                    overlay_path: v.overlay_path.as_ref(),
                    media_kind: v.media_kind,
                    duration_secs: scene.map(|s| s.duration_secs).unwrap_or_default(),
                    narration: scene.map(|s| s.narration.as_str()).unwrap_or_default(),
                }
            })
            .collect();
        let manifest = EditManifest {
            job_id: job.job_id(),
            title: &script.title,
            scenes,
            audio,
        };
        let body = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StageError::InvalidOutput(format!("manifest: {e}")))?;

        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        let dir = self.output_dir.join(job.job_id());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join("edit_manifest.json");
        tokio::fs::write(&path, body).await?;
        tracing::info!(job_id = %job.job_id(), path = %path.display(), "edit manifest written");
        Ok(path)
    }
}
