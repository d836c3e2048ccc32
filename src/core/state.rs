//! 任务状态：Job、阶段与各阶段产物
//!
//! Job 的 phase 与产物字段只由 Orchestrator 通过 `store_artifact` 写入；生产者拿到的是 `&Job`，
//! 只能返回自己的产物，无法改动其它字段。phase 单调不减，且始终与产物存在情况一致。

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::PipelineError;
use crate::router::PresencePattern;
use crate::visual::{SceneVisual, VisualMetrics};

/// 制作需求（自由文本）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Brief {
    pub description: String,
    pub audience: String,
    pub duration_secs: u32,
    pub style: String,
    pub call_to_action: Option<String>,
}

impl Brief {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            audience: "general".to_string(),
            duration_secs: 30,
            style: "modern".to_string(),
            call_to_action: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_call_to_action(mut self, cta: impl Into<String>) -> Self {
        self.call_to_action = Some(cta.into());
        self
    }
}

/// 脚本中的单个场景
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    pub scene_number: u32,
    pub visual_description: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub duration_secs: f32,
    #[serde(default)]
    pub narration: String,
}

impl Scene {
    pub fn new(scene_number: u32, visual_description: impl Into<String>) -> Self {
        Self {
            scene_number,
            visual_description: visual_description.into(),
            mood: String::new(),
            duration_secs: 5.0,
            narration: String::new(),
        }
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = mood.into();
        self
    }
}

/// 脚本产物：有序场景列表（核心只关心其存在）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: String,
    pub scenes: Vec<Scene>,
}

/// 视觉计划：按 scene_number 排序的场景素材 + 聚合指标
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VisualPlan {
    pub scenes: Vec<SceneVisual>,
    pub metrics: VisualMetrics,
}

/// 音频产物；Silent 为显式的「无音频」标记
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioTrack {
    File { path: PathBuf, duration_secs: f32 },
    Silent,
}

/// 阶段产物（由生产者返回，Orchestrator 负责写入 Job）
#[derive(Clone, Debug)]
pub enum StageArtifact {
    Script(Script),
    Visual(VisualPlan),
    Audio(AudioTrack),
    Edit(PathBuf),
}

impl StageArtifact {
    /// 写入该产物后 Job 应处于的阶段
    pub fn completed_phase(&self) -> Phase {
        match self {
            StageArtifact::Script(_) => Phase::ScriptReady,
            StageArtifact::Visual(_) => Phase::VisualReady,
            StageArtifact::Audio(_) => Phase::AudioReady,
            StageArtifact::Edit(_) => Phase::EditReady,
        }
    }
}

/// 任务进度（0-4）；Finish 是 EditReady 之后的路由结果，不是 phase 值
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    Init = 0,
    ScriptReady = 1,
    VisualReady = 2,
    AudioReady = 3,
    EditReady = 4,
}

impl Phase {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::ScriptReady => "script_ready",
            Phase::VisualReady => "visual_ready",
            Phase::AudioReady => "audio_ready",
            Phase::EditReady => "edit_ready",
        };
        write!(f, "{}({})", name, self.as_u8())
    }
}

/// 一次制作请求
#[derive(Clone, Debug, Serialize)]
pub struct Job {
    job_id: String,
    brief: Brief,
    created_at: DateTime<Utc>,
    phase: Phase,
    script: Option<Script>,
    visual_plan: Option<VisualPlan>,
    audio: Option<AudioTrack>,
    final_media_path: Option<PathBuf>,
}

impl Job {
    pub fn new(brief: Brief) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            brief,
            created_at: Utc::now(),
            phase: Phase::Init,
            script: None,
            visual_plan: None,
            audio: None,
            final_media_path: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn brief(&self) -> &Brief {
        &self.brief
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    pub fn visual_plan(&self) -> Option<&VisualPlan> {
        self.visual_plan.as_ref()
    }

    pub fn audio(&self) -> Option<&AudioTrack> {
        self.audio.as_ref()
    }

    pub fn final_media_path(&self) -> Option<&PathBuf> {
        self.final_media_path.as_ref()
    }

    /// 产物存在模式（路由的唯一输入）
    pub fn presence(&self) -> PresencePattern {
        PresencePattern {
            script: self.script.is_some(),
            visual_plan: self.visual_plan.is_some(),
            audio: self.audio.is_some(),
            final_media: self.final_media_path.is_some(),
            phase: self.phase,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::EditReady
    }

    /// 写入阶段产物并推进 phase；产物重复写入、前置产物缺失或 phase 回退均视为不变式破坏
    pub(crate) fn store_artifact(&mut self, artifact: StageArtifact) -> Result<Phase, PipelineError> {
        let next = artifact.completed_phase();
        if next <= self.phase {
            return Err(PipelineError::InvariantViolation(format!(
                "phase would not advance: {} -> {}",
                self.phase, next
            )));
        }
        let presence = self.presence();
        let prerequisites_met = match next {
            Phase::Init | Phase::ScriptReady => true,
            Phase::VisualReady => presence.script,
            Phase::AudioReady => presence.script && presence.visual_plan,
            Phase::EditReady => presence.script && presence.visual_plan && presence.audio,
        };
        if !prerequisites_met {
            return Err(PipelineError::InvariantViolation(format!(
                "missing prerequisites for {}",
                next
            )));
        }

        match artifact {
            StageArtifact::Script(s) => set_once(&mut self.script, s, "script")?,
            StageArtifact::Visual(v) => set_once(&mut self.visual_plan, v, "visual_plan")?,
            StageArtifact::Audio(a) => set_once(&mut self.audio, a, "audio")?,
            StageArtifact::Edit(p) => set_once(&mut self.final_media_path, p, "final_media_path")?,
        }
        self.phase = next;
        Ok(next)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::InvariantViolation(format!(
            "{field} already set"
        )));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> Script {
        Script {
            title: "t".into(),
            scenes: vec![Scene::new(1, "Pessoa trabalhando no laptop")],
        }
    }

    #[test]
    fn test_new_job_starts_at_init_with_no_artifacts() {
        let job = Job::new(Brief::new("demo"));
        assert_eq!(job.phase(), Phase::Init);
        let p = job.presence();
        assert!(!p.script && !p.visual_plan && !p.audio && !p.final_media);
        assert!(!job.job_id().is_empty());
    }

    #[test]
    fn test_store_artifact_advances_phase() {
        let mut job = Job::new(Brief::new("demo"));
        let phase = job.store_artifact(StageArtifact::Script(script())).unwrap();
        assert_eq!(phase, Phase::ScriptReady);
        assert_eq!(job.phase(), Phase::ScriptReady);
        assert!(job.script().is_some());
    }

    #[test]
    fn test_store_artifact_twice_is_invariant_violation() {
        let mut job = Job::new(Brief::new("demo"));
        job.store_artifact(StageArtifact::Script(script())).unwrap();
        let err = job.store_artifact(StageArtifact::Script(script())).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
        assert_eq!(job.phase(), Phase::ScriptReady);
    }

    #[test]
    fn test_store_artifact_without_prerequisite_rejected() {
        let mut job = Job::new(Brief::new("demo"));
        let err = job
            .store_artifact(StageArtifact::Audio(AudioTrack::Silent))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
        assert_eq!(job.phase(), Phase::Init);
        assert!(job.audio().is_none());
    }

    #[test]
    fn test_phase_ordering_and_display() {
        assert!(Phase::Init < Phase::ScriptReady);
        assert!(Phase::AudioReady < Phase::EditReady);
        assert_eq!(Phase::VisualReady.as_u8(), 2);
        assert_eq!(Phase::EditReady.to_string(), "edit_ready(4)");
    }
}
