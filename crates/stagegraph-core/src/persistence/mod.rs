use crate::models::{CoreError, StageExecution, StageExecutionId};

pub type PersistenceResult<T> = Result<T, CoreError>;

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

/// Durable record of stage executions, kept for diagnostics after a stage ends.
pub trait ExecutionStore: Send + Sync {
    /// Inserts the execution or replaces the stored record with the same id.
    fn save_execution(&self, execution: &StageExecution) -> PersistenceResult<()>;

    fn load_execution(&self, id: StageExecutionId) -> PersistenceResult<Option<StageExecution>>;

    fn list_recent(&self, limit: usize) -> PersistenceResult<Vec<StageExecution>>;

    fn next_execution_id(&self) -> PersistenceResult<u64>;
}
