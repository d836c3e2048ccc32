//! 核心编排层：任务状态、错误与恢复、任务监管、场景调度、阶段编排

pub mod builder;
pub mod error;
pub mod events;
pub mod job_supervisor;
pub mod orchestrator;
pub mod recovery;
pub mod state;
pub mod task_scheduler;

pub use builder::{create_llm_from_config, OrchestratorBuilder};
pub use error::{PipelineError, RecoveryAction, StageError};
pub use events::{EventSink, PipelineEvent};
pub use job_supervisor::JobSupervisor;
pub use orchestrator::{JobReport, Orchestrator, Producers};
pub use recovery::RecoveryEngine;
pub use state::{AudioTrack, Brief, Job, Phase, Scene, Script, StageArtifact, VisualPlan};
pub use task_scheduler::{run_guarded, GuardError, TaskScheduler};
