//! 核心编排层：错误、执行结果模型、运行历史、会话监管、编排器与构建器

pub mod builder;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod result;
pub mod session_supervisor;

pub use builder::{create_llm_from_config, OrchestratorBuilder};
pub use error::AgentError;
pub use history::HistoryStore;
pub use orchestrator::{GenerationSettings, Orchestrator};
pub use result::{
    OverallStatus, PlanExecutionResult, StepRecord, StepResult, StopReason, TaskRun,
    ToolExecutionResult,
};
pub use session_supervisor::{RunGuard, SessionSupervisor};
