//! 流水线集成测试：离线组件（mock LLM / mock 素材后端）跑完整任务

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clipflow::backends::{MediaGenerator, MediaSearch, MockGenerator, MockSearch};
use clipflow::config::AppConfig;
use clipflow::core::{
    EventSink, JobSupervisor, Orchestrator, OrchestratorBuilder, Phase, PipelineError, PipelineEvent,
    RecoveryAction, RecoveryEngine,
};
use clipflow::llm::MockLlmClient;
use clipflow::router::{CachePolicy, DecisionCache, RoutingDecision};
use clipflow::visual::MediaKind;
use clipflow::{Brief, Job};

const MIXED_BRIEF: &str = "Pessoa trabalhando no laptop. Logo holográfico flutuando no espaço. \
                           Escritório com hologramas de dados. Ambiente corporativo moderno";

fn config(dir: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.app.output_dir = dir.join("out");
    cfg.app.media_dir = dir.join("media");
    cfg.llm.provider = "mock".into();
    cfg
}

fn offline(cfg: AppConfig, search: Arc<dyn MediaSearch>, generator: Arc<dyn MediaGenerator>) -> OrchestratorBuilder {
    OrchestratorBuilder::new(cfg)
        .with_llm(None)
        .with_router_llm(None)
        .with_backends(search, generator)
}

fn mock_backends(dir: &Path) -> (Arc<MockSearch>, Arc<MockGenerator>) {
    (
        Arc::new(MockSearch::new(dir.join("media"))),
        Arc::new(MockGenerator::new(dir.join("media"))),
    )
}

#[tokio::test]
async fn test_full_offline_run_produces_manifest_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let (search, generator) = mock_backends(dir.path());
    let orch = offline(config(dir.path()), search.clone(), generator.clone()).build();

    let mut job = Job::new(Brief::new(MIXED_BRIEF).with_duration(20));
    let report = orch.run(&mut job).await.unwrap();

    assert_eq!(report.final_phase, Phase::EditReady);
    let manifest = report.final_media_path.clone().unwrap();
    assert!(tokio::fs::metadata(&manifest).await.unwrap().is_file());

    let metrics = report.visual.clone().unwrap();
    assert_eq!(metrics.scenes, 4);
    assert_eq!(metrics.media_search_scenes, 2);
    assert_eq!(metrics.media_generate_scenes, 1);
    assert_eq!(metrics.hybrid_scenes, 1);
    assert_eq!((metrics.tier1_scenes, metrics.tier2_scenes, metrics.tier3_scenes), (2, 1, 1));
    assert_eq!(metrics.llm_calls, 0);
    assert_eq!(metrics.resolved_without_llm, 1.0);
    assert!((metrics.total_cost - 0.08).abs() < 1e-9);
    // hybrid 场景两个后端各调用一次
    assert_eq!(search.calls(), 3);
    assert_eq!(generator.calls(), 2);

    let plan = job.visual_plan().unwrap();
    assert_eq!(plan.scenes[2].media_kind, MediaKind::Hybrid);
    assert!(plan.scenes[2].overlay_path.is_some());
}

#[tokio::test]
async fn test_llm_router_matches_rule_only_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let (search, generator) = mock_backends(dir.path());

    let rules_only = offline(config(dir.path()), search.clone(), generator.clone()).build();
    let mut a = Job::new(Brief::new("Pessoa trabalhando no laptop"));
    let expected = rules_only.run(&mut a).await.unwrap();

    let router_llm = Arc::new(MockLlmClient::with_responses([
        "script_stage",
        "VisualStage",
        "edit_stage",
        "let me think about it",
        "finish",
    ]));
    let with_llm = offline(config(dir.path()), search, generator)
        .with_router_llm(Some(router_llm))
        .build();
    let mut b = Job::new(Brief::new("Pessoa trabalhando no laptop"));
    let report = with_llm.run(&mut b).await.unwrap();

    assert_eq!(report.decisions, expected.decisions);
    assert_eq!(report.router.llm_decisions, 3);
    assert_eq!(report.router.divergences, 1);
    assert_eq!(report.router.fallbacks, 1);
}

#[tokio::test]
async fn test_phase_never_decreases() {
    let dir = tempfile::tempdir().unwrap();
    let (search, generator) = mock_backends(dir.path());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orch = offline(config(dir.path()), search, generator)
        .with_events(EventSink::new(tx))
        .build();

    let mut job = Job::new(Brief::new(MIXED_BRIEF));
    orch.run(&mut job).await.unwrap();
    drop(orch);

    let mut phases = Vec::new();
    let mut scenes = 0;
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::StageCompleted { phase, .. } => phases.push(phase),
            PipelineEvent::SceneResolved { .. } => scenes += 1,
            _ => {}
        }
    }
    assert_eq!(
        phases,
        vec![Phase::ScriptReady, Phase::VisualReady, Phase::AudioReady, Phase::EditReady]
    );
    assert!(phases.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(scenes, 4);
}

#[tokio::test]
async fn test_search_outage_falls_back_to_generation() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockGenerator::new(dir.path().join("media")));
    let orch = offline(config(dir.path()), Arc::new(MockSearch::failing()), generator.clone()).build();

    let mut job = Job::new(Brief::new("Pessoa trabalhando no laptop. Equipe reunida na sala de aula"));
    let report = orch.run(&mut job).await.unwrap();

    let plan = job.visual_plan().unwrap();
    assert!(plan
        .scenes
        .iter()
        .all(|s| s.media_kind == MediaKind::Image && s.is_fallback));
    assert_eq!(report.visual.unwrap().fallbacks, 2);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_total_outage_yields_placeholders_and_still_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let orch = offline(
        config(dir.path()),
        Arc::new(MockSearch::failing()),
        Arc::new(MockGenerator::failing()),
    )
    .build();

    let mut job = Job::new(Brief::new(MIXED_BRIEF));
    let report = orch.run(&mut job).await.unwrap();

    let plan = job.visual_plan().unwrap();
    assert!(plan.scenes.iter().all(|s| s.media_kind == MediaKind::Placeholder));
    assert!(plan.scenes.iter().all(|s| s.cost == 0.0 && s.error.is_some()));
    let metrics = report.visual.unwrap();
    assert_eq!(metrics.placeholders, 4);
    assert_eq!(metrics.total_cost, 0.0);
    assert_eq!(report.final_phase, Phase::EditReady);
}

#[tokio::test]
async fn test_concurrent_scenes_keep_script_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.visual.max_concurrent_scenes = 3;
    let orch = offline(
        cfg,
        Arc::new(MockSearch::new(dir.path()).with_delay(Duration::from_millis(10))),
        Arc::new(MockGenerator::new(dir.path())),
    )
    .build();

    let brief = (1..=8)
        .map(|i| format!("Pessoa número {i} trabalhando"))
        .collect::<Vec<_>>()
        .join(". ");
    let mut job = Job::new(Brief::new(brief));
    orch.run(&mut job).await.unwrap();

    let numbers: Vec<u32> = job
        .visual_plan()
        .unwrap()
        .scenes
        .iter()
        .map(|s| s.scene_number)
        .collect();
    assert_eq!(numbers, (1..=8).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_edit_failure_is_retried_without_redoing_earlier_stages() {
    let dir = tempfile::tempdir().unwrap();
    // output_dir 指向一个普通文件，剪辑阶段无法创建目录
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"x").unwrap();
    let mut bad = config(dir.path());
    bad.app.output_dir = blocker;

    let (search, generator) = mock_backends(dir.path());
    let failing = offline(bad, search.clone(), generator.clone()).build();
    let mut job = Job::new(Brief::new("Pessoa trabalhando no laptop"));
    let err = failing.run(&mut job).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::StageFailed {
            stage: RoutingDecision::EditStage,
            last_phase: Phase::AudioReady,
            ..
        }
    ));
    assert_eq!(
        RecoveryEngine::new().handle(&err),
        RecoveryAction::RetryStage {
            stage: RoutingDecision::EditStage,
            from_phase: Phase::AudioReady,
        }
    );
    assert_eq!(job.phase(), Phase::AudioReady);
    let searches_before = search.calls();

    let fixed = offline(config(dir.path()), search.clone(), generator).build();
    let report = fixed.run(&mut job).await.unwrap();
    assert_eq!(report.decisions, vec![RoutingDecision::EditStage, RoutingDecision::Finish]);
    assert_eq!(search.calls(), searches_before);
}

#[tokio::test]
async fn test_cancelled_job_resumes_from_last_phase() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Arc::new(JobSupervisor::new());
    let orch: Arc<Orchestrator> = Arc::new(
        offline(
            config(dir.path()),
            Arc::new(MockSearch::new(dir.path()).with_delay(Duration::from_millis(300))),
            Arc::new(MockGenerator::new(dir.path())),
        )
        .with_supervisor(supervisor.clone())
        .build(),
    );

    let mut job = Job::new(Brief::new("Pessoa trabalhando no laptop. Equipe em reunião"));
    let job_id = job.job_id().to_string();
    let runner = orch.clone();
    let handle = tokio::spawn(async move {
        let result = runner.run(&mut job).await;
        (job, result)
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(supervisor.cancel(&job_id));
    let (mut job, result) = handle.await.unwrap();
    assert!(matches!(
        result,
        Err(PipelineError::Cancelled {
            last_phase: Phase::ScriptReady,
            ..
        })
    ));
    assert!(job.script().is_some());
    assert!(job.visual_plan().is_none());

    let report = orch.run(&mut job).await.unwrap();
    assert_eq!(report.decisions[0], RoutingDecision::VisualStage);
    assert_eq!(report.final_phase, Phase::EditReady);
}

#[tokio::test]
async fn test_shared_cache_serves_second_job() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DecisionCache::new(CachePolicy::unbounded()));
    let (search, generator) = mock_backends(dir.path());

    let first = offline(config(dir.path()), search.clone(), generator.clone())
        .with_cache(cache.clone())
        .build();
    first.run(&mut Job::new(Brief::new("Pessoa trabalhando"))).await.unwrap();
    assert_eq!(cache.stats().misses, 5);

    let second = offline(config(dir.path()), search, generator)
        .with_cache(cache.clone())
        .build();
    let report = second.run(&mut Job::new(Brief::new("Logo holográfico"))).await.unwrap();
    assert_eq!(report.router.cache.hits, 5);
    assert_eq!(cache.len(), 5);
}
