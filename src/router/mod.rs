//! 路由层：根据 Job 的产物存在模式决定下一阶段（缓存 + LLM 快速决策 + 规则回退）

pub mod cache;
pub mod decision;
pub mod engine;
pub mod fingerprint;
pub mod rules;

pub use cache::{CachePolicy, CacheStats, DecisionCache};
pub use decision::{InvalidDecision, RoutingDecision};
pub use engine::{Router, RouterConfig, RouterStats};
pub use fingerprint::{PresencePattern, StateFingerprint};
pub use rules::rule_decision;
