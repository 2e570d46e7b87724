pub mod context;
pub mod error;
pub mod stage;
pub mod task;

pub use context::{
    CLOUD_PROVIDER_KEY, HANDLE_KEY, OperationContext, OperationHandle, REMOTE_STATUS_KEY,
};
pub use error::{CoreError, CoreErrorKind, CoreResult};
pub use stage::{
    ExecutionStatus, StageExecution, StageExecutionId, StageFailure, StageSpec, TaskExecution,
    timestamp_now,
};
pub use task::{TaskKind, TaskResult, TaskStatus, TaskType};
