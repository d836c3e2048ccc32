//! 错误恢复引擎
//!
//! 根据 PipelineError 返回 RecoveryAction，供调用方决定是只重跑失败阶段、从断点继续还是终止。

use crate::core::{PipelineError, RecoveryAction, StageError};

/// 将任务级错误映射为可执行动作（重跑阶段 / 继续 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &PipelineError) -> RecoveryAction {
        match err {
            // 阶段内部的取消与任务取消同样处理：已完成阶段保留，从断点继续
            PipelineError::StageFailed {
                last_phase,
                source: StageError::Cancelled,
                ..
            } => RecoveryAction::Resume {
                from_phase: *last_phase,
            },
            PipelineError::StageFailed {
                stage, last_phase, ..
            } => RecoveryAction::RetryStage {
                stage: *stage,
                from_phase: *last_phase,
            },
            PipelineError::Cancelled { last_phase, .. } => RecoveryAction::Resume {
                from_phase: *last_phase,
            },
            PipelineError::InvariantViolation(_) | PipelineError::ConfigError(_) => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Phase;
    use crate::router::RoutingDecision;

    #[test]
    fn test_recovery_stage_failure_retries_only_that_stage() {
        let err = PipelineError::StageFailed {
            stage: RoutingDecision::AudioStage,
            last_phase: Phase::VisualReady,
            source: StageError::Producer("tts down".into()),
        };
        assert_eq!(
            RecoveryEngine::new().handle(&err),
            RecoveryAction::RetryStage {
                stage: RoutingDecision::AudioStage,
                from_phase: Phase::VisualReady,
            }
        );
    }

    #[test]
    fn test_recovery_cancelled_resumes() {
        let engine = RecoveryEngine::new();
        let err = PipelineError::Cancelled {
            job_id: "j".into(),
            last_phase: Phase::ScriptReady,
        };
        assert_eq!(
            engine.handle(&err),
            RecoveryAction::Resume {
                from_phase: Phase::ScriptReady
            }
        );
        let inner = PipelineError::StageFailed {
            stage: RoutingDecision::VisualStage,
            last_phase: Phase::ScriptReady,
            source: StageError::Cancelled,
        };
        assert!(matches!(engine.handle(&inner), RecoveryAction::Resume { .. }));
    }

    #[test]
    fn test_recovery_invariant_violation_aborts() {
        let engine = RecoveryEngine::new();
        let err = PipelineError::InvariantViolation("script already set".into());
        assert_eq!(engine.handle(&err), RecoveryAction::Abort);
        assert_eq!(
            engine.handle(&PipelineError::ConfigError("bad".into())),
            RecoveryAction::Abort
        );
    }
}
