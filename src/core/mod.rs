//! 核心编排层：错误、轮次状态、任务调度、构建器与主控状态机

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod task_scheduler;

pub use builder::AgentBuilder;
pub use error::{AgentError, ToolFailure};
pub use orchestrator::{ModelInfo, Orchestrator, OrchestratorConfig, TurnOptions, DEFAULT_MAX_ROUNDS};
pub use state::{TurnOutcome, TurnPhase, TurnReport};
pub use task_scheduler::TaskScheduler;
