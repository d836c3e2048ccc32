//! 流水线错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 PipelineError 决定 RetryStage / Resume / Abort。
//! 决策源失败（LLM）与后端失败（素材检索/生成）在各自组件内部恢复，不会出现在这里。

use thiserror::Error;

use crate::core::Phase;
use crate::llm::LlmError;
use crate::router::RoutingDecision;

/// 单个阶段生产者的失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("Producer failed: {0}")]
    Producer(String),

    #[error("Invalid producer output: {0}")]
    InvalidOutput(String),

    #[error("Stage timed out after {0}s")]
    Timeout(u64),

    #[error("Stage cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl From<std::io::Error> for StageError {
    fn from(e: std::io::Error) -> Self {
        StageError::Io(e.to_string())
    }
}

/// 任务级错误：阶段失败（可恢复）、取消（可恢复）、不变式破坏（致命）
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} failed (last completed phase {last_phase}): {source}")]
    StageFailed {
        stage: RoutingDecision,
        last_phase: Phase,
        #[source]
        source: StageError,
    },

    #[error("Job {job_id} cancelled at phase {last_phase}")]
    Cancelled { job_id: String, last_phase: Phase },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 只重跑失败的阶段，之前完成的阶段保留
    RetryStage {
        stage: RoutingDecision,
        from_phase: Phase,
    },
    /// 任务被取消，可从该阶段继续
    Resume { from_phase: Phase },
    /// 编程错误或配置错误，终止
    Abort,
}
