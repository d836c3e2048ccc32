//! 视觉阶段生产者：并发解析所有场景（信号量限流），按 scene_number 排序并聚合指标

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::core::events::{EventSink, PipelineEvent};
use crate::core::{Job, StageError, TaskScheduler, VisualPlan};
use crate::producers::VisualProducer;
use crate::visual::{SceneVisual, ToolSelector, VisualMetrics};

pub struct VisualPlanner {
    selector: Arc<ToolSelector>,
    scheduler: TaskScheduler,
    events: EventSink,
}

impl VisualPlanner {
    pub fn new(selector: Arc<ToolSelector>, scheduler: TaskScheduler) -> Self {
        Self {
            selector,
            scheduler,
            events: EventSink::none(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }
}

#[async_trait]
impl VisualProducer for VisualPlanner {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<VisualPlan, StageError> {
        let script = job
            .script()
            .ok_or_else(|| StageError::InvalidOutput("visual stage needs a script".to_string()))?;
        let style = job.brief().style.as_str();

        let tasks = script.scenes.iter().map(|scene| async move {
            // 信号量从不关闭；拿不到许可时直接执行
            let _permit = self.scheduler.acquire_scene().await;
            let visual = self.selector.resolve_scene(scene, style, cancel).await;
            self.events.emit(PipelineEvent::scene_resolved(&visual));
            visual
        });
        let mut scenes: Vec<SceneVisual> = join_all(tasks).await;

        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        scenes.sort_by_key(|s| s.scene_number);
        let metrics = VisualMetrics::from_scenes(&scenes);
        tracing::info!(
            job_id = %job.job_id(),
            scenes = metrics.scenes,
            fallbacks = metrics.fallbacks,
            placeholders = metrics.placeholders,
            llm_calls = metrics.llm_calls,
            total_cost = metrics.total_cost,
            "visual plan ready"
        );
        Ok(VisualPlan { scenes, metrics })
    }
}
