//! 流水线过程事件：阶段开始/完成/失败、场景解析结果、任务结束（可序列化为 JSON 供外部展示）

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::classify::{Backend, Tier};
use crate::core::Phase;
use crate::router::RoutingDecision;
use crate::visual::{MediaKind, SceneVisual};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// 生产者开始运行
    StageStarted {
        job_id: String,
        stage: RoutingDecision,
        phase: Phase,
    },
    /// 产物已写入，phase 已推进
    StageCompleted {
        job_id: String,
        stage: RoutingDecision,
        phase: Phase,
    },
    StageFailed {
        job_id: String,
        stage: RoutingDecision,
        last_phase: Phase,
        error: String,
    },
    /// 单个场景的素材已确定
    SceneResolved {
        scene_number: u32,
        backend: Backend,
        media_kind: MediaKind,
        tier: Tier,
        is_fallback: bool,
    },
    Finished {
        job_id: String,
        final_media_path: Option<PathBuf>,
    },
}

impl PipelineEvent {
    pub fn scene_resolved(visual: &SceneVisual) -> Self {
        PipelineEvent::SceneResolved {
            scene_number: visual.scene_number,
            backend: visual.backend_used,
            media_kind: visual.media_kind,
            tier: visual.tier,
            is_fallback: visual.is_fallback,
        }
    }
}

/// 可选的事件发送端；接收端已关闭时静默丢弃
#[derive(Clone, Debug, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<PipelineEvent>>);

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self(Some(tx))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let e = PipelineEvent::StageStarted {
            job_id: "j1".into(),
            stage: RoutingDecision::VisualStage,
            phase: Phase::ScriptReady,
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "stage_started");
        assert_eq!(v["stage"], "visual_stage");
    }

    #[tokio::test]
    async fn test_sink_tolerates_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        drop(rx);
        sink.emit(PipelineEvent::Finished {
            job_id: "j1".into(),
            final_media_path: None,
        });
        EventSink::none().emit(PipelineEvent::Finished {
            job_id: "j2".into(),
            final_media_path: None,
        });
    }
}
