//! 阶段编排器：主控循环
//!
//! 每一步：把 Job 的存在性模式交给 Router，校验决策的前置产物，在任务取消令牌下运行对应生产者，
//! 写入返回的产物并推进 phase。路由只看产物是否存在，所以失败或取消后再次 run 会跳过已完成的阶段。

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::events::{EventSink, PipelineEvent};
use crate::core::{Job, JobSupervisor, Phase, PipelineError, StageArtifact, StageError};
use crate::producers::{AudioProducer, EditProducer, ScriptProducer, VisualProducer};
use crate::router::{PresencePattern, Router, RouterStats, RoutingDecision};
use crate::visual::VisualMetrics;

/// 四个阶段的生产者
#[derive(Clone)]
pub struct Producers {
    pub script: Arc<dyn ScriptProducer>,
    pub visual: Arc<dyn VisualProducer>,
    pub audio: Arc<dyn AudioProducer>,
    pub edit: Arc<dyn EditProducer>,
}

/// run 结束后的报告
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub final_media_path: Option<PathBuf>,
    pub final_phase: Phase,
    /// 本次 run 经过的 phase（含起点）
    pub phases: Vec<Phase>,
    pub decisions: Vec<RoutingDecision>,
    pub router: RouterStats,
    pub visual: Option<VisualMetrics>,
}

pub struct Orchestrator {
    router: Arc<Router>,
    producers: Producers,
    supervisor: Arc<JobSupervisor>,
    events: EventSink,
}

/// 决策对应阶段的前置产物是否齐全
fn prerequisites_met(decision: RoutingDecision, p: &PresencePattern) -> bool {
    match decision {
        RoutingDecision::ScriptStage => true,
        RoutingDecision::VisualStage => p.script,
        RoutingDecision::AudioStage => p.script && p.visual_plan,
        RoutingDecision::EditStage => p.script && p.visual_plan && p.audio,
        RoutingDecision::Finish => p.script && p.visual_plan && p.audio && p.final_media,
    }
}

impl Orchestrator {
    pub fn new(router: Arc<Router>, producers: Producers) -> Self {
        Self {
            router,
            producers,
            supervisor: Arc::new(JobSupervisor::new()),
            events: EventSink::none(),
        }
    }

    pub fn with_supervisor(mut self, supervisor: Arc<JobSupervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn supervisor(&self) -> &Arc<JobSupervisor> {
        &self.supervisor
    }

    /// 取消正在运行的任务
    pub fn cancel_job(&self, job_id: &str) -> bool {
        self.supervisor.cancel(job_id)
    }

    /// 推进一步；Finish 不运行任何生产者
    pub async fn advance(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, PipelineError> {
        let last_phase = job.phase();
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                job_id: job.job_id().to_string(),
                last_phase,
            });
        }

        let presence = job.presence();
        let decision = self.router.route_presence(&presence, cancel).await;
        if !prerequisites_met(decision, &presence) {
            return Err(PipelineError::InvariantViolation(format!(
                "{decision} chosen without its prerequisites ({})",
                presence.canonical()
            )));
        }
        if decision == RoutingDecision::Finish {
            return Ok(decision);
        }

        let job_id = job.job_id().to_string();
        tracing::info!(job_id = %job_id, stage = %decision, phase = %last_phase, "stage started");
        self.events.emit(PipelineEvent::StageStarted {
            job_id: job_id.clone(),
            stage: decision,
            phase: last_phase,
        });

        let produced = match decision {
            RoutingDecision::ScriptStage => self
                .producers
                .script
                .produce(job, cancel)
                .await
                .map(StageArtifact::Script),
            RoutingDecision::VisualStage => self
                .producers
                .visual
                .produce(job, cancel)
                .await
                .map(StageArtifact::Visual),
            RoutingDecision::AudioStage => self
                .producers
                .audio
                .produce(job, cancel)
                .await
                .map(StageArtifact::Audio),
            RoutingDecision::EditStage => self
                .producers
                .edit
                .produce(job, cancel)
                .await
                .map(StageArtifact::Edit),
            RoutingDecision::Finish => return Ok(decision),
        };

        let artifact = match produced {
            Ok(artifact) => artifact,
            Err(StageError::Cancelled) => {
                tracing::warn!(job_id = %job_id, stage = %decision, "stage cancelled");
                return Err(PipelineError::Cancelled { job_id, last_phase });
            }
            Err(source) => {
                tracing::warn!(job_id = %job_id, stage = %decision, error = %source, "stage failed");
                self.events.emit(PipelineEvent::StageFailed {
                    job_id,
                    stage: decision,
                    last_phase,
                    error: source.to_string(),
                });
                return Err(PipelineError::StageFailed {
                    stage: decision,
                    last_phase,
                    source,
                });
            }
        };

        let phase = job.store_artifact(artifact)?;
        tracing::info!(job_id = %job_id, stage = %decision, phase = %phase, "stage completed");
        self.events.emit(PipelineEvent::StageCompleted {
            job_id,
            stage: decision,
            phase,
        });
        Ok(decision)
    }

    /// 循环 advance 直到 Finish；失败或取消后可再次调用继续
    pub async fn run(&self, job: &mut Job) -> Result<JobReport, PipelineError> {
        let cancel = self.supervisor.register(job.job_id());
        let result = self.drive(job, &cancel).await;
        self.supervisor.release(job.job_id());
        result
    }

    async fn drive(&self, job: &mut Job, cancel: &CancellationToken) -> Result<JobReport, PipelineError> {
        let mut phases = vec![job.phase()];
        let mut decisions = Vec::new();
        loop {
            let decision = self.advance(job, cancel).await?;
            decisions.push(decision);
            if decision == RoutingDecision::Finish {
                break;
            }
            phases.push(job.phase());
        }

        let router = self.router.stats();
        tracing::info!(
            job_id = %job.job_id(),
            cache_hits = router.cache.hits,
            cache_misses = router.cache.misses,
            llm_decisions = router.llm_decisions,
            fallbacks = router.fallbacks,
            divergences = router.divergences,
            "job finished"
        );
        self.events.emit(PipelineEvent::Finished {
            job_id: job.job_id().to_string(),
            final_media_path: job.final_media_path().cloned(),
        });

        Ok(JobReport {
            job_id: job.job_id().to_string(),
            final_media_path: job.final_media_path().cloned(),
            final_phase: job.phase(),
            phases,
            decisions,
            router,
            visual: job.visual_plan().map(|p| p.metrics.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::{AudioTrack, Brief, Scene, Script, VisualPlan};
    use crate::router::{CachePolicy, DecisionCache, RouterConfig};

    #[derive(Default)]
    struct StubScript;

    #[async_trait]
    impl ScriptProducer for StubScript {
        async fn produce(&self, _job: &Job, _cancel: &CancellationToken) -> Result<Script, StageError> {
            Ok(Script {
                title: "t".into(),
                scenes: vec![Scene::new(1, "a")],
            })
        }
    }

    struct StubVisual;

    #[async_trait]
    impl VisualProducer for StubVisual {
        async fn produce(&self, _job: &Job, _cancel: &CancellationToken) -> Result<VisualPlan, StageError> {
            Ok(VisualPlan::default())
        }
    }

    /// 前 fail_times 次失败
    struct FlakyAudio {
        fail_times: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioProducer for FlakyAudio {
        async fn produce(&self, _job: &Job, _cancel: &CancellationToken) -> Result<AudioTrack, StageError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_times {
                return Err(StageError::Producer("tts unavailable".into()));
            }
            Ok(AudioTrack::Silent)
        }
    }

    struct StubEdit;

    #[async_trait]
    impl EditProducer for StubEdit {
        async fn produce(&self, _job: &Job, _cancel: &CancellationToken) -> Result<PathBuf, StageError> {
            Ok(PathBuf::from("/out/final.json"))
        }
    }

    fn orchestrator(audio_failures: usize) -> Orchestrator {
        let router = Router::new(
            Arc::new(DecisionCache::new(CachePolicy::unbounded())),
            RouterConfig::default(),
        );
        Orchestrator::new(
            Arc::new(router),
            Producers {
                script: Arc::new(StubScript),
                visual: Arc::new(StubVisual),
                audio: Arc::new(FlakyAudio {
                    fail_times: audio_failures,
                    calls: AtomicUsize::new(0),
                }),
                edit: Arc::new(StubEdit),
            },
        )
    }

    #[tokio::test]
    async fn test_run_visits_every_stage_in_order() {
        let orch = orchestrator(0);
        let mut job = Job::new(Brief::new("demo"));
        let report = orch.run(&mut job).await.unwrap();
        assert_eq!(
            report.decisions,
            vec![
                RoutingDecision::ScriptStage,
                RoutingDecision::VisualStage,
                RoutingDecision::AudioStage,
                RoutingDecision::EditStage,
                RoutingDecision::Finish,
            ]
        );
        assert_eq!(
            report.phases,
            vec![Phase::Init, Phase::ScriptReady, Phase::VisualReady, Phase::AudioReady, Phase::EditReady]
        );
        assert_eq!(report.final_media_path, Some(PathBuf::from("/out/final.json")));
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn test_finish_is_terminal() {
        let orch = orchestrator(0);
        let mut job = Job::new(Brief::new("demo"));
        orch.run(&mut job).await.unwrap();
        let token = CancellationToken::new();
        for _ in 0..3 {
            assert_eq!(orch.advance(&mut job, &token).await.unwrap(), RoutingDecision::Finish);
            assert_eq!(job.phase(), Phase::EditReady);
        }
    }

    #[tokio::test]
    async fn test_stage_failure_keeps_phase_and_resumes() {
        let orch = orchestrator(1);
        let mut job = Job::new(Brief::new("demo"));
        let err = orch.run(&mut job).await.unwrap_err();
        match err {
            PipelineError::StageFailed { stage, last_phase, .. } => {
                assert_eq!(stage, RoutingDecision::AudioStage);
                assert_eq!(last_phase, Phase::VisualReady);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(job.phase(), Phase::VisualReady);

        let report = orch.run(&mut job).await.unwrap();
        assert_eq!(report.decisions[0], RoutingDecision::AudioStage);
        assert_eq!(report.phases[0], Phase::VisualReady);
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_any_stage() {
        let orch = orchestrator(0);
        let mut job = Job::new(Brief::new("demo"));
        let token = CancellationToken::new();
        token.cancel();
        let err = orch.advance(&mut job, &token).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { last_phase: Phase::Init, .. }));
        assert_eq!(job.phase(), Phase::Init);
    }

    #[tokio::test]
    async fn test_events_follow_stage_lifecycle() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let orch = orchestrator(0).with_events(EventSink::new(tx));
        let mut job = Job::new(Brief::new("demo"));
        orch.run(&mut job).await.unwrap();
        drop(orch);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap_or_default().to_string());
        }
        assert_eq!(kinds.first().map(String::as_str), Some("stage_started"));
        assert_eq!(kinds.last().map(String::as_str), Some("finished"));
        assert_eq!(kinds.iter().filter(|k| *k == "stage_completed").count(), 4);
    }

    #[test]
    fn test_prerequisites_table() {
        let empty = Job::new(Brief::new("x")).presence();
        assert!(prerequisites_met(RoutingDecision::ScriptStage, &empty));
        assert!(!prerequisites_met(RoutingDecision::VisualStage, &empty));
        assert!(!prerequisites_met(RoutingDecision::EditStage, &empty));
        assert!(!prerequisites_met(RoutingDecision::Finish, &empty));
    }
}
