pub mod execution_runtime;
pub mod stage_runner;

pub use execution_runtime::StageExecutionRuntime;
pub use stage_runner::{ActiveStage, StageRunner, StepOutcome};

pub use crate::config::PollPolicy;

use crate::models::CoreError;

pub type OrchestrationResult<T> = Result<T, CoreError>;
