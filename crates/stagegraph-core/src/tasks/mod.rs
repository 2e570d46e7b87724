pub mod operation;
pub mod registry;

pub use operation::{
    MonitorOperationTask, OperationStatusSource, OperationSubmitter, RemoteOperationState,
    SubmitOperationTask,
};
pub use registry::{BoundTask, TaskRegistry};

use crate::models::{CoreResult, OperationContext, TaskResult, TaskType};

pub type TaskOutcome = CoreResult<TaskResult>;

/// Executable unit bound into a task graph by its type identifier.
///
/// Tasks are stateless across invocations; anything that must survive between
/// calls is written to the context through `TaskResult::outputs`.
pub trait Task: Send + Sync {
    fn task_type(&self) -> &TaskType;

    fn execute(&self, context: &OperationContext) -> TaskOutcome;
}
