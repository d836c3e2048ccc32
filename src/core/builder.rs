//! 编排器构建器：统一的组件初始化逻辑
//!
//! 根据配置与环境变量选择 LLM 与素材后端；缺少 API Key 时整条流水线以离线模式运行
//! （规则表路由、按句切分脚本、mock 素材后端）。

use std::path::PathBuf;
use std::sync::Arc;

use crate::backends::{
    HttpImageGenerator, MediaGenerator, MediaSearch, MockGenerator, MockSearch, StockVideoSearch,
};
use crate::config::{load_config, AppConfig};
use crate::core::events::EventSink;
use crate::core::{JobSupervisor, Orchestrator, PipelineError, Producers, TaskScheduler};
use crate::llm::{create_deepseek_client, LlmClient, OpenAiClient};
use crate::producers::{BriefScriptProducer, LlmScriptProducer, ManifestEditor, ScriptProducer, SilentAudio};
use crate::router::{DecisionCache, Router};
use crate::tools::BackendExecutor;
use crate::visual::{ToolSelector, VisualPlanner};

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容）；都不可用时返回 None
pub fn create_llm_from_config(cfg: &AppConfig, model: &str) -> Option<Arc<dyn LlmClient>> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        return None;
    }
    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        tracing::info!("Using DeepSeek LLM ({})", model);
        Some(Arc::new(create_deepseek_client(model)))
    } else if use_openai {
        tracing::info!("Using OpenAI LLM ({})", model);
        Some(Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        )))
    } else {
        tracing::warn!("No API key set or provider unknown, running offline (rule routing, no escalation)");
        None
    }
}

/// 编排器构建器：未显式注入的组件按配置创建
pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Option<Option<Arc<dyn LlmClient>>>,
    router_llm: Option<Option<Arc<dyn LlmClient>>>,
    search: Option<Arc<dyn MediaSearch>>,
    generator: Option<Arc<dyn MediaGenerator>>,
    cache: Option<Arc<DecisionCache>>,
    supervisor: Option<Arc<JobSupervisor>>,
    events: EventSink,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            router_llm: None,
            search: None,
            generator: None,
            cache: None,
            supervisor: None,
            events: EventSink::none(),
        }
    }

    /// 加载配置文件后创建构建器；文件存在但无法解析时返回 ConfigError
    pub fn from_config_path(path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let config = load_config(path).map_err(|e| PipelineError::ConfigError(e.to_string()))?;
        Ok(Self::new(config))
    }

    /// 指定脚本生成与场景升级用的 LLM（None 表示离线）
    pub fn with_llm(mut self, llm: Option<Arc<dyn LlmClient>>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 指定路由决策用的 LLM（None 表示只用规则表）
    pub fn with_router_llm(mut self, llm: Option<Arc<dyn LlmClient>>) -> Self {
        self.router_llm = Some(llm);
        self
    }

    pub fn with_backends(mut self, search: Arc<dyn MediaSearch>, generator: Arc<dyn MediaGenerator>) -> Self {
        self.search = Some(search);
        self.generator = Some(generator);
        self
    }

    /// 多个编排器共享同一个决策缓存
    pub fn with_cache(mut self, cache: Arc<DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_supervisor(mut self, supervisor: Arc<JobSupervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    fn build_search(&self) -> Arc<dyn MediaSearch> {
        if let Some(search) = &self.search {
            return search.clone();
        }
        let section = &self.config.visual.search;
        match std::env::var(&section.api_key_env) {
            Ok(key) => {
                tracing::info!(api = %section.api_base, "Using stock video search");
                Arc::new(StockVideoSearch::new(
                    &section.api_base,
                    key,
                    section.per_page,
                    self.config.visual.backend_timeout_secs,
                    &self.config.app.media_dir,
                ))
            }
            Err(_) => {
                tracing::warn!("{} not set, using mock media search", section.api_key_env);
                Arc::new(MockSearch::new(&self.config.app.media_dir))
            }
        }
    }

    fn build_generator(&self) -> Arc<dyn MediaGenerator> {
        if let Some(generator) = &self.generator {
            return generator.clone();
        }
        let section = &self.config.visual.generate;
        match &section.endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "Using HTTP image generator");
                Arc::new(
                    HttpImageGenerator::new(
                        endpoint,
                        std::env::var(&section.api_key_env).ok(),
                        self.config.visual.backend_timeout_secs,
                        &self.config.app.media_dir,
                    )
                    .with_size(section.width, section.height),
                )
            }
            None => {
                tracing::warn!("No image endpoint configured, using mock generator");
                Arc::new(MockGenerator::new(&self.config.app.media_dir))
            }
        }
    }

    pub fn build(self) -> Orchestrator {
        let llm = match &self.llm {
            Some(llm) => llm.clone(),
            None => create_llm_from_config(&self.config, &self.config.llm.model),
        };
        let router_llm = match &self.router_llm {
            Some(llm) => llm.clone(),
            None => create_llm_from_config(&self.config, &self.config.llm.router_model),
        };

        let cache = self
            .cache
            .clone()
            .unwrap_or_else(|| Arc::new(DecisionCache::new(self.config.router.cache_policy())));
        let mut router = Router::new(cache, self.config.router.router_config());
        if let Some(llm) = router_llm {
            router = router.with_llm(llm);
        }

        let executor = Arc::new(BackendExecutor::new(
            self.build_search(),
            self.build_generator(),
            self.config.visual.backend_timeout_secs,
        ));
        let mut selector = ToolSelector::new(executor, self.config.visual.selector_config());
        if let Some(llm) = &llm {
            selector = selector.with_llm(llm.clone());
        }
        let planner = VisualPlanner::new(
            Arc::new(selector),
            TaskScheduler::new(self.config.visual.max_concurrent_scenes),
        )
        .with_events(self.events.clone());

        let script: Arc<dyn ScriptProducer> = match &llm {
            Some(llm) => Arc::new(LlmScriptProducer::new(llm.clone(), self.config.llm.timeouts.request)),
            None => Arc::new(BriefScriptProducer::new()),
        };

        let producers = Producers {
            script,
            visual: Arc::new(planner),
            audio: Arc::new(SilentAudio),
            edit: Arc::new(ManifestEditor::new(&self.config.app.output_dir)),
        };

        let mut orchestrator = Orchestrator::new(Arc::new(router), producers).with_events(self.events);
        if let Some(supervisor) = self.supervisor {
            orchestrator = orchestrator.with_supervisor(supervisor);
        }
        orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RecoveryAction, RecoveryEngine};
    use std::io::Write;

    #[test]
    fn test_malformed_config_is_fatal() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[visual]\nmax_concurrent_scenes = \"many\"").unwrap();
        let err = match OrchestratorBuilder::from_config_path(Some(file.path().to_path_buf())) {
            Ok(_) => panic!("malformed config accepted"),
            Err(e) => e,
        };
        assert!(matches!(err, PipelineError::ConfigError(_)));
        assert_eq!(RecoveryEngine::new().handle(&err), RecoveryAction::Abort);
    }

    #[test]
    fn test_valid_config_builds() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[llm]\nprovider = \"mock\"\n\n[visual]\nmax_concurrent_scenes = 2").unwrap();
        let builder = OrchestratorBuilder::from_config_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(builder.config.visual.max_concurrent_scenes, 2);
        let orchestrator = builder.build();
        assert_eq!(orchestrator.supervisor().active_jobs(), 0);
    }
}
