//! 脚本生产者
//!
//! - LlmScriptProducer：让 LLM 输出 JSON 场景列表，严格反序列化与校验
//! - BriefScriptProducer：离线模式，按句子把 brief 描述切成场景

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::core::task_scheduler::{run_guarded, GuardError};
use crate::core::{Brief, Job, Scene, Script, StageError};
use crate::llm::{CompletionRequest, LlmClient};
use crate::producers::ScriptProducer;

const SCRIPT_SYSTEM_PROMPT: &str = r#"You write short promotional video scripts.
Reply with exactly one JSON object and nothing else:
{"title": "...", "scenes": [{"scene_number": 1, "visual_description": "...", "mood": "...", "duration_secs": 5.0, "narration": "..."}]}
visual_description must describe what is visible on screen (people, places, objects, abstract elements).
Scene numbers start at 1 and are unique."#;

#[derive(Debug, Deserialize)]
struct ScriptReply {
    #[serde(default)]
    title: String,
    scenes: Vec<Scene>,
}

pub struct LlmScriptProducer {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmScriptProducer {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(timeout_secs),
            max_tokens: 2048,
        }
    }

    fn user_prompt(brief: &Brief) -> String {
        let mut prompt = format!(
            "Brief: {}\nAudience: {}\nTarget duration: {}s\nStyle: {}",
            brief.description, brief.audience, brief.duration_secs, brief.style
        );
        if let Some(cta) = &brief.call_to_action {
            prompt.push_str(&format!("\nCall to action: {cta}"));
        }
        prompt
    }
}

/// 解析并校验 LLM 的脚本 JSON（允许整体包在 ```json 代码块里）
fn parse_script(raw: &str) -> Result<Script, StageError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    let reply: ScriptReply =
        serde_json::from_str(body).map_err(|e| StageError::InvalidOutput(format!("script json: {e}")))?;
    validate_scenes(&reply.scenes)?;
    Ok(Script {
        title: reply.title,
        scenes: reply.scenes,
    })
}

fn validate_scenes(scenes: &[Scene]) -> Result<(), StageError> {
    if scenes.is_empty() {
        return Err(StageError::InvalidOutput("script has no scenes".to_string()));
    }
    let mut seen = HashSet::new();
    for scene in scenes {
        if scene.visual_description.trim().is_empty() {
            return Err(StageError::InvalidOutput(format!(
                "scene {} has an empty visual description",
                scene.scene_number
            )));
        }
        if !seen.insert(scene.scene_number) {
            return Err(StageError::InvalidOutput(format!(
                "duplicate scene number {}",
                scene.scene_number
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ScriptProducer for LlmScriptProducer {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<Script, StageError> {
        let request = CompletionRequest::new(SCRIPT_SYSTEM_PROMPT, Self::user_prompt(job.brief()))
            .with_temperature(0.7)
            .with_max_tokens(self.max_tokens);

        let raw = match run_guarded(self.timeout, cancel, self.llm.complete(&request)).await {
            Ok(answer) => answer?,
            Err(GuardError::Timeout(d)) => return Err(StageError::Timeout(d.as_secs())),
            Err(GuardError::Cancelled) => return Err(StageError::Cancelled),
        };
        let script = parse_script(&raw)?;
        tracing::info!(job_id = %job.job_id(), scenes = script.scenes.len(), "script generated");
        Ok(script)
    }
}

/// 离线脚本：一句一个场景，时长平均分配
#[derive(Debug, Default)]
pub struct BriefScriptProducer;

impl BriefScriptProducer {
    pub fn new() -> Self {
        Self
    }

    fn split_scenes(brief: &Brief) -> Vec<Scene> {
        let sentences: Vec<&str> = brief
            .description
            .split(['.', '!', '?', ';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let per_scene = if sentences.is_empty() {
            0.0
        } else {
            brief.duration_secs as f32 / sentences.len() as f32
        };
        sentences
            .into_iter()
            .enumerate()
            .map(|(i, sentence)| Scene {
                scene_number: i as u32 + 1,
                visual_description: sentence.to_string(),
                mood: String::new(),
                duration_secs: per_scene,
                narration: sentence.to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl ScriptProducer for BriefScriptProducer {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<Script, StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        let scenes = Self::split_scenes(job.brief());
        validate_scenes(&scenes)?;
        Ok(Script {
            title: job.brief().description.chars().take(60).collect(),
            scenes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    const REPLY: &str = r#"{"title": "Launch", "scenes": [
        {"scene_number": 1, "visual_description": "Pessoa trabalhando no laptop", "mood": "focused"},
        {"scene_number": 2, "visual_description": "Logo holográfico flutuando no espaço"}
    ]}"#;

    #[tokio::test]
    async fn test_llm_script_parses_scenes() {
        let llm = Arc::new(MockLlmClient::with_responses([format!("```json\n{REPLY}\n```")]));
        let producer = LlmScriptProducer::new(llm.clone(), 5);
        let job = Job::new(Brief::new("Launch video").with_call_to_action("Sign up"));
        let script = producer.produce(&job, &CancellationToken::new()).await.unwrap();
        assert_eq!(script.title, "Launch");
        assert_eq!(script.scenes.len(), 2);
        assert_eq!(script.scenes[0].mood, "focused");
        assert!(llm.requests()[0].last_user().unwrap_or_default().contains("Sign up"));
    }

    #[tokio::test]
    async fn test_llm_script_rejects_invalid_output() {
        for reply in [
            "Here is your script!",
            r#"{"title": "x", "scenes": []}"#,
            r#"{"scenes": [{"scene_number": 1, "visual_description": "a"}, {"scene_number": 1, "visual_description": "b"}]}"#,
        ] {
            let producer = LlmScriptProducer::new(Arc::new(MockLlmClient::with_responses([reply])), 5);
            let err = producer
                .produce(&Job::new(Brief::new("x")), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, StageError::InvalidOutput(_)), "{reply}");
        }
    }

    #[tokio::test]
    async fn test_llm_error_becomes_stage_error() {
        let producer = LlmScriptProducer::new(
            Arc::new(MockLlmClient::failing(LlmError::ApiError("down".into()))),
            5,
        );
        let err = producer
            .produce(&Job::new(Brief::new("x")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Llm(LlmError::ApiError("down".into())));
    }

    #[tokio::test]
    async fn test_brief_script_one_scene_per_sentence() {
        let job = Job::new(
            Brief::new("Pessoa trabalhando no laptop. Logo holográfico flutuando no espaço!").with_duration(30),
        );
        let script = BriefScriptProducer::new()
            .produce(&job, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(script.scenes.len(), 2);
        assert_eq!(script.scenes[1].scene_number, 2);
        assert_eq!(script.scenes[1].visual_description, "Logo holográfico flutuando no espaço");
        assert_eq!(script.scenes[0].duration_secs, 15.0);
    }

    #[tokio::test]
    async fn test_brief_script_rejects_empty_description() {
        let err = BriefScriptProducer::new()
            .produce(&Job::new(Brief::new("  ")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(_)));
    }
}
