//! 视觉层：场景级工具选择、回退链、并发规划与指标

pub mod keywords;
pub mod metrics;
pub mod planner;
pub mod selector;

pub use keywords::{derive_keywords, derive_overlay_prompt, derive_prompt};
pub use metrics::VisualMetrics;
pub use planner::VisualPlanner;
pub use selector::{MediaKind, SceneVisual, SelectorConfig, ToolSelector, VisualCosts};
