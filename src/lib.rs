//! clipflow - 短视频制作流水线的决策层
//!
//! 模块划分：
//! - **backends**: 素材后端抽象与实现（视频检索 / 图像生成 / Mock）
//! - **classify**: 场景分类引擎（固定词表，三层判定）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 任务状态、阶段编排、错误恢复、任务监管、场景调度
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **producers**: 脚本 / 音频 / 剪辑阶段生产者
//! - **router**: 下一阶段决策（状态指纹、决策缓存、规则表兜底）
//! - **tools**: 提供给 LLM 的视觉工具目录与后端执行器
//! - **visual**: 场景级工具选择、回退链与视觉规划

pub mod backends;
pub mod classify;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod producers;
pub mod router;
pub mod tools;
pub mod visual;

pub use crate::core::{Brief, Job, JobReport, Orchestrator, OrchestratorBuilder, PipelineError};
