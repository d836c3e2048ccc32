//! 工具选择层：为单个场景决定并执行素材获取
//!
//! 1. 先走分类引擎；tier 1/2 直接调用对应后端（Hybrid = 检索底片 + 生成叠加层）
//! 2. Undecided 时做一次 LLM 工具调用（三个工具，严格解析）；失败则默认检索
//! 3. 回退链：检索失败 → 用场景描述生成一次；生成失败 → 用派生关键词检索一次；都失败 → 占位
//!
//! resolve_scene 从不返回错误，所有失败都体现在 SceneVisual 上。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::backends::BackendError;
use crate::classify::{Backend, ClassificationResult, SceneClassifier, Tier};
use crate::core::task_scheduler::run_guarded;
use crate::core::Scene;
use crate::llm::{CompletionRequest, LlmClient};
use crate::tools::{catalog_json, parse_tool_call, BackendExecutor, SearchArgs, ToolInvocation};
use crate::visual::keywords::{derive_keywords, derive_overlay_prompt, derive_prompt};

/// 场景素材的形态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
    /// 实拍底片 + 生成叠加层
    Hybrid,
    /// 所有后端都失败时的占位
    Placeholder,
}

/// 单个场景的视觉结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneVisual {
    pub scene_number: u32,
    pub media_path: Option<PathBuf>,
    #[serde(default)]
    pub overlay_path: Option<PathBuf>,
    pub media_kind: MediaKind,
    pub backend_used: Backend,
    pub cost: f64,
    pub is_fallback: bool,
    pub tier: Tier,
    #[serde(default)]
    pub llm_calls: u32,
    #[serde(default)]
    pub search_calls: u32,
    #[serde(default)]
    pub generate_calls: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl SceneVisual {
    fn placeholder(scene_number: u32, backend: Backend, tier: Tier, error: String) -> Self {
        Self {
            scene_number,
            media_path: None,
            overlay_path: None,
            media_kind: MediaKind::Placeholder,
            backend_used: backend,
            cost: 0.0,
            is_fallback: true,
            tier,
            llm_calls: 0,
            search_calls: 0,
            generate_calls: 0,
            error: Some(error),
        }
    }

    fn with_calls(mut self, search_calls: u32, generate_calls: u32) -> Self {
        self.search_calls = search_calls;
        self.generate_calls = generate_calls;
        self
    }
}

/// 单次调用成本
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualCosts {
    pub search: f64,
    pub generate: f64,
}

impl Default for VisualCosts {
    fn default() -> Self {
        Self {
            search: 0.0,
            generate: 0.04,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SelectorConfig {
    pub costs: VisualCosts,
    pub escalation_timeout: Duration,
    pub escalation_max_tokens: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            costs: VisualCosts::default(),
            escalation_timeout: Duration::from_secs(20),
            escalation_max_tokens: 256,
        }
    }
}

const ESCALATION_RULES: &str = r#"You choose how to obtain the visual for ONE video scene.
Rules:
- If the scene shows people, faces, hands, professions or human actions, NEVER use generate_image.
- Use search_stock_media for real-world scenes and places.
- Use generate_image only for abstract or conceptual visuals with no people.
- Use compose_hybrid when real footage needs a small abstract digital overlay.
Reply with exactly one JSON object and nothing else:
{"tool": "<tool name>", "args": {...}}"#;

fn escalation_system_prompt() -> String {
    format!("{ESCALATION_RULES}\n\nAvailable tools:\n{}", catalog_json())
}

/// 场景的解析上下文
struct SceneCtx<'a> {
    scene: &'a Scene,
    style: &'a str,
    tier: Tier,
}

pub struct ToolSelector {
    executor: Arc<BackendExecutor>,
    llm: Option<Arc<dyn LlmClient>>,
    classifier: SceneClassifier,
    config: SelectorConfig,
}

impl ToolSelector {
    pub fn new(executor: Arc<BackendExecutor>, config: SelectorConfig) -> Self {
        Self {
            executor,
            llm: None,
            classifier: SceneClassifier::new(),
            config,
        }
    }

    /// 配置 tier 3 升级用的 LLM；未配置时 Undecided 场景直接走默认检索
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub async fn resolve_scene(
        &self,
        scene: &Scene,
        job_style: &str,
        cancel: &CancellationToken,
    ) -> SceneVisual {
        let desc = scene.visual_description.as_str();
        let classification = self.classifier.classify(desc, &scene.mood, job_style);
        let ctx = SceneCtx {
            scene,
            style: job_style,
            tier: classification.tier(),
        };

        let visual = match classification.backend() {
            Backend::MediaSearch => self.search_first(&ctx, &derive_keywords(desc), cancel).await,
            Backend::MediaGenerate => {
                let prompt = derive_prompt(desc, job_style, &scene.mood);
                self.generate_first(&ctx, &prompt, cancel).await
            }
            Backend::Hybrid => {
                let overlay = derive_overlay_prompt(desc, job_style);
                self.hybrid(&ctx, &derive_keywords(desc), &overlay, cancel).await
            }
            Backend::Undecided => {
                let (invocation, llm_calls) = self.escalate(&ctx, &classification, cancel).await;
                let mut visual = match invocation {
                    ToolInvocation::Search(args) => self.search_first(&ctx, &args.keywords, cancel).await,
                    ToolInvocation::Generate(args) => self.generate_first(&ctx, &args.prompt, cancel).await,
                    ToolInvocation::Hybrid(args) => {
                        self.hybrid(&ctx, &args.keywords, &args.overlay_prompt, cancel).await
                    }
                };
                visual.llm_calls = llm_calls;
                visual
            }
        };

        tracing::info!(
            scene = scene.scene_number,
            tier = %visual.tier,
            backend = %visual.backend_used,
            kind = ?visual.media_kind,
            fallback = visual.is_fallback,
            "scene resolved"
        );
        visual
    }

    /// tier 3：一次工具调用；任何失败都退回到默认检索
    async fn escalate(
        &self,
        ctx: &SceneCtx<'_>,
        classification: &ClassificationResult,
        cancel: &CancellationToken,
    ) -> (ToolInvocation, u32) {
        let default = ToolInvocation::Search(SearchArgs {
            keywords: derive_keywords(&ctx.scene.visual_description),
        });
        let Some(llm) = &self.llm else {
            tracing::debug!(scene = ctx.scene.scene_number, "no escalation llm, default search");
            return (default, 0);
        };

        let user = format!(
            "Scene {}: {}\nMood: {}\nStyle: {}\nClassifier note: {}",
            ctx.scene.scene_number,
            ctx.scene.visual_description,
            ctx.scene.mood,
            ctx.style,
            classification.reason()
        );
        let request = CompletionRequest::new(escalation_system_prompt(), user)
            .with_temperature(0.0)
            .with_max_tokens(self.config.escalation_max_tokens);

        match run_guarded(self.config.escalation_timeout, cancel, llm.complete(&request)).await {
            Ok(Ok(text)) => match parse_tool_call(&text) {
                Ok(invocation) => {
                    tracing::info!(scene = ctx.scene.scene_number, tool = %invocation.tool(), "scene escalated");
                    (invocation, 1)
                }
                Err(e) => {
                    tracing::warn!(scene = ctx.scene.scene_number, error = %e, "escalation answer rejected, default search");
                    (default, 1)
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(scene = ctx.scene.scene_number, error = %e, "escalation failed, default search");
                (default, 1)
            }
            Err(e) => {
                tracing::warn!(scene = ctx.scene.scene_number, error = %e, "escalation aborted, default search");
                (default, 1)
            }
        }
    }

    async fn search_first(&self, ctx: &SceneCtx<'_>, keywords: &str, cancel: &CancellationToken) -> SceneVisual {
        let n = ctx.scene.scene_number;
        let search_err = match self.executor.search(keywords, cancel).await {
            Ok(hit) => {
                return SceneVisual {
                    scene_number: n,
                    media_path: Some(hit.local_path),
                    overlay_path: None,
                    media_kind: MediaKind::Video,
                    backend_used: Backend::MediaSearch,
                    cost: self.config.costs.search,
                    is_fallback: false,
                    tier: ctx.tier,
                    llm_calls: 0,
                    search_calls: 0,
                    generate_calls: 0,
                    error: None,
                }
                .with_calls(1, 0);
            }
            Err(e) => e,
        };
        if search_err == BackendError::Cancelled {
            return SceneVisual::placeholder(n, Backend::MediaSearch, ctx.tier, search_err.to_string())
                .with_calls(1, 0);
        }

        tracing::warn!(scene = n, error = %search_err, "search failed, falling back to generation");
        let prompt = derive_prompt(&ctx.scene.visual_description, ctx.style, &ctx.scene.mood);
        match self.executor.generate(&prompt, cancel).await {
            Ok(img) => SceneVisual {
                scene_number: n,
                media_path: Some(img.local_path),
                overlay_path: None,
                media_kind: MediaKind::Image,
                backend_used: Backend::MediaGenerate,
                cost: self.config.costs.generate,
                is_fallback: true,
                tier: ctx.tier,
                llm_calls: 0,
                search_calls: 0,
                generate_calls: 0,
                error: Some(format!("search: {search_err}")),
            }
            .with_calls(1, 1),
            Err(gen_err) => {
                tracing::warn!(scene = n, error = %gen_err, "fallback generation failed, using placeholder");
                SceneVisual::placeholder(
                    n,
                    Backend::MediaSearch,
                    ctx.tier,
                    format!("search: {search_err}; generate: {gen_err}"),
                )
                .with_calls(1, 1)
            }
        }
    }

    async fn generate_first(&self, ctx: &SceneCtx<'_>, prompt: &str, cancel: &CancellationToken) -> SceneVisual {
        let n = ctx.scene.scene_number;
        let gen_err = match self.executor.generate(prompt, cancel).await {
            Ok(img) => {
                return SceneVisual {
                    scene_number: n,
                    media_path: Some(img.local_path),
                    overlay_path: None,
                    media_kind: MediaKind::Image,
                    backend_used: Backend::MediaGenerate,
                    cost: self.config.costs.generate,
                    is_fallback: false,
                    tier: ctx.tier,
                    llm_calls: 0,
                    search_calls: 0,
                    generate_calls: 0,
                    error: None,
                }
                .with_calls(0, 1);
            }
            Err(e) => e,
        };
        if gen_err == BackendError::Cancelled {
            return SceneVisual::placeholder(n, Backend::MediaGenerate, ctx.tier, gen_err.to_string())
                .with_calls(0, 1);
        }

        tracing::warn!(scene = n, error = %gen_err, "generation failed, falling back to search");
        let keywords = derive_keywords(&ctx.scene.visual_description);
        match self.executor.search(&keywords, cancel).await {
            Ok(hit) => SceneVisual {
                scene_number: n,
                media_path: Some(hit.local_path),
                overlay_path: None,
                media_kind: MediaKind::Video,
                backend_used: Backend::MediaSearch,
                cost: self.config.costs.search,
                is_fallback: true,
                tier: ctx.tier,
                llm_calls: 0,
                search_calls: 0,
                generate_calls: 0,
                error: Some(format!("generate: {gen_err}")),
            }
            .with_calls(1, 1),
            Err(search_err) => {
                tracing::warn!(scene = n, error = %search_err, "fallback search failed, using placeholder");
                SceneVisual::placeholder(
                    n,
                    Backend::MediaGenerate,
                    ctx.tier,
                    format!("generate: {gen_err}; search: {search_err}"),
                )
                .with_calls(1, 1)
            }
        }
    }

    /// 底片失败 → 占位（有人物的场景不会落到整图生成）；叠加层失败 → 只用底片
    async fn hybrid(
        &self,
        ctx: &SceneCtx<'_>,
        keywords: &str,
        overlay_prompt: &str,
        cancel: &CancellationToken,
    ) -> SceneVisual {
        let n = ctx.scene.scene_number;
        let base = match self.executor.search(keywords, cancel).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(scene = n, error = %e, "hybrid base footage failed, using placeholder");
                return SceneVisual::placeholder(n, Backend::Hybrid, ctx.tier, format!("base footage: {e}"))
                    .with_calls(1, 0);
            }
        };

        match self.executor.generate(overlay_prompt, cancel).await {
            Ok(overlay) => SceneVisual {
                scene_number: n,
                media_path: Some(base.local_path),
                overlay_path: Some(overlay.local_path),
                media_kind: MediaKind::Hybrid,
                backend_used: Backend::Hybrid,
                cost: self.config.costs.search + self.config.costs.generate,
                is_fallback: false,
                tier: ctx.tier,
                llm_calls: 0,
                search_calls: 0,
                generate_calls: 0,
                error: None,
            }
            .with_calls(1, 1),
            Err(e) => {
                tracing::warn!(scene = n, error = %e, "hybrid overlay failed, using base footage only");
                SceneVisual {
                    scene_number: n,
                    media_path: Some(base.local_path),
                    overlay_path: None,
                    media_kind: MediaKind::Video,
                    backend_used: Backend::MediaSearch,
                    cost: self.config.costs.search,
                    is_fallback: true,
                    tier: ctx.tier,
                    llm_calls: 0,
                    search_calls: 0,
                    generate_calls: 0,
                    error: Some(format!("overlay: {e}")),
                }
                .with_calls(1, 1)
            }
        }
    }
}
