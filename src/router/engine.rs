//! 路由器：决策缓存 + LLM 快速决策 + 规则回退
//!
//! route 流程：指纹命中缓存直接返回；否则（若配置了 LLM）把产物存在模式交给快速模型，要求只回答一个阶段名；
//! 回答必须能严格解析为枚举成员，且与规则表一致，否则丢弃并使用规则表结果。最终结果写入缓存。
//! LLM 的任何失败都在这里消化，只体现在计数器里。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::task_scheduler::run_guarded;
use crate::core::Job;
use crate::llm::{CompletionRequest, LlmClient};
use crate::router::{
    rule_decision, CacheStats, DecisionCache, PresencePattern, RoutingDecision,
};

const ROUTER_SYSTEM_PROMPT: &str = "You route jobs through a video production pipeline \
(script -> visual -> audio -> edit). Given which artifacts are present, reply with exactly one \
token and nothing else, chosen from: script_stage, visual_stage, audio_stage, edit_stage, finish.";

/// 路由器配置
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// 缓存未命中时是否询问 LLM
    pub llm_enabled: bool,
    pub decision_timeout: Duration,
    pub max_tokens: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            llm_enabled: true,
            decision_timeout: Duration::from_millis(3000),
            max_tokens: 8,
        }
    }
}

/// 路由统计快照
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub cache: CacheStats,
    /// LLM 给出且与规则一致的决策数
    pub llm_decisions: u64,
    /// LLM 出错、超时或回答无效后改用规则表的次数
    pub fallbacks: u64,
    /// LLM 回答合法但与规则表不一致的次数（同样改用规则表）
    pub divergences: u64,
    /// 未配置 LLM 时直接由规则表决定的次数
    pub rule_only: u64,
}

#[derive(Debug, Default)]
struct RouterCounters {
    llm_decisions: AtomicU64,
    fallbacks: AtomicU64,
    divergences: AtomicU64,
    rule_only: AtomicU64,
}

pub struct Router {
    cache: Arc<DecisionCache>,
    llm: Option<Arc<dyn LlmClient>>,
    config: RouterConfig,
    counters: RouterCounters,
}

impl Router {
    pub fn new(cache: Arc<DecisionCache>, config: RouterConfig) -> Self {
        Self {
            cache,
            llm: None,
            config,
            counters: RouterCounters::default(),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    /// 计算 Job 的下一阶段
    pub async fn route(&self, job: &Job) -> RoutingDecision {
        self.route_presence(&job.presence(), &CancellationToken::new())
            .await
    }

    /// 带任务级取消的路由；取消只会中断 LLM 调用，仍返回规则表结果
    pub async fn route_presence(
        &self,
        presence: &PresencePattern,
        cancel: &CancellationToken,
    ) -> RoutingDecision {
        let fp = presence.fingerprint();
        if let Some(decision) = self.cache.get(&fp) {
            tracing::debug!(fingerprint = %fp, decision = %decision, "route cache hit");
            return decision;
        }

        let expected = rule_decision(presence);
        let decision = match (&self.llm, self.config.llm_enabled) {
            (Some(llm), true) => self.decide_with_llm(llm.as_ref(), presence, expected, cancel).await,
            _ => {
                self.counters.rule_only.fetch_add(1, Ordering::Relaxed);
                expected
            }
        };

        self.cache.insert(fp.clone(), decision);
        tracing::debug!(fingerprint = %fp, decision = %decision, "route computed");
        decision
    }

    async fn decide_with_llm(
        &self,
        llm: &dyn LlmClient,
        presence: &PresencePattern,
        expected: RoutingDecision,
        cancel: &CancellationToken,
    ) -> RoutingDecision {
        let request = CompletionRequest::new(ROUTER_SYSTEM_PROMPT, presence.describe())
            .with_temperature(0.0)
            .with_max_tokens(self.config.max_tokens);

        let answer = run_guarded(self.config.decision_timeout, cancel, llm.complete(&request)).await;
        let raw = match answer {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "route llm failed, using rule table");
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                return expected;
            }
            Err(e) => {
                tracing::warn!(error = %e, "route llm call aborted, using rule table");
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                return expected;
            }
        };

        match raw.parse::<RoutingDecision>() {
            Ok(d) if d == expected => {
                self.counters.llm_decisions.fetch_add(1, Ordering::Relaxed);
                d
            }
            Ok(d) => {
                tracing::warn!(llm = %d, rule = %expected, "route llm diverged from rule table");
                self.counters.divergences.fetch_add(1, Ordering::Relaxed);
                expected
            }
            Err(e) => {
                tracing::warn!(error = %e, "route llm answer rejected, using rule table");
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                expected
            }
        }
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            cache: self.cache.stats(),
            llm_decisions: self.counters.llm_decisions.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            divergences: self.counters.divergences.load(Ordering::Relaxed),
            rule_only: self.counters.rule_only.load(Ordering::Relaxed),
        }
    }
}
