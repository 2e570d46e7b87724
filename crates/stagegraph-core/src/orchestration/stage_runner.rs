use std::sync::Arc;
use std::time::Duration;

use crate::graph::StageCatalog;
use crate::models::{
    CoreErrorKind, CoreResult, ExecutionStatus, StageExecution, StageExecutionId, StageSpec,
    TaskExecution, TaskKind, TaskStatus, timestamp_now,
};
use crate::tasks::{BoundTask, TaskRegistry};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// A task succeeded and the next one is ready to run.
    Advanced,
    /// The current task reported `Running` and must be invoked again later.
    Pending,
    Finished(ExecutionStatus),
}

/// Builds and binds stage executions. Shared by every execution it starts.
#[derive(Clone)]
pub struct StageRunner {
    catalog: Arc<StageCatalog>,
    tasks: Arc<TaskRegistry>,
}

impl StageRunner {
    pub fn new(catalog: Arc<StageCatalog>, tasks: Arc<TaskRegistry>) -> Self {
        Self { catalog, tasks }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Builds the graph for `spec` and binds every node. Configuration errors
    /// surface here, before any task runs.
    pub fn start(&self, id: StageExecutionId, spec: &StageSpec) -> CoreResult<ActiveStage> {
        let graph = self.catalog.build(spec)?;
        let bound = self.tasks.bind(&graph)?;

        let tasks = bound
            .iter()
            .map(|entry| TaskExecution {
                name: entry.node.name.clone(),
                task_type: entry.node.task_type.clone(),
                kind: entry.node.kind,
                status: ExecutionStatus::NotStarted,
                invocations: 0,
                started_at: None,
                finished_at: None,
            })
            .collect();

        tracing::info!(
            execution_id = id.0,
            stage_type = %spec.stage_type,
            "starting stage"
        );

        Ok(ActiveStage {
            execution: StageExecution {
                id,
                stage_type: spec.stage_type.clone(),
                status: ExecutionStatus::Running,
                tasks,
                context: spec.initial_context(),
                failure: None,
                created_at: timestamp_now(),
                finished_at: None,
            },
            bound,
        })
    }
}

/// A stage execution together with the task instances bound to its graph.
pub struct ActiveStage {
    execution: StageExecution,
    bound: Vec<BoundTask>,
}

impl ActiveStage {
    pub fn execution(&self) -> &StageExecution {
        &self.execution
    }

    pub fn into_execution(self) -> StageExecution {
        self.execution
    }

    /// Invokes the current task once and applies its result.
    pub fn step(&mut self) -> StepOutcome {
        if self.execution.is_terminal() {
            return StepOutcome::Finished(self.execution.status);
        }

        let Some(index) = self.execution.current_task_index() else {
            self.finish_succeeded();
            return StepOutcome::Finished(ExecutionStatus::Succeeded);
        };

        let now = timestamp_now();
        {
            let record = &mut self.execution.tasks[index];
            if record.status == ExecutionStatus::NotStarted {
                record.status = ExecutionStatus::Running;
                record.started_at = Some(now);
                tracing::debug!(
                    execution_id = self.execution.id.0,
                    task = %record.name,
                    task_type = %record.task_type,
                    kind = record.kind.as_str(),
                    "starting task"
                );
            }
            record.invocations = record.invocations.saturating_add(1);
        }

        let task = self.bound[index].task.clone();
        let kind = self.bound[index].node.kind;
        let name = self.bound[index].node.name.clone();

        match task.execute(&self.execution.context) {
            Ok(result) => {
                self.execution.context.merge(result.outputs);
                match result.status {
                    TaskStatus::Running => StepOutcome::Pending,
                    TaskStatus::Succeeded => {
                        let record = &mut self.execution.tasks[index];
                        record.status = ExecutionStatus::Succeeded;
                        record.finished_at = Some(timestamp_now());

                        if index + 1 == self.execution.tasks.len() {
                            self.finish_succeeded();
                            StepOutcome::Finished(ExecutionStatus::Succeeded)
                        } else {
                            StepOutcome::Advanced
                        }
                    }
                    TaskStatus::Failed => {
                        let message = result
                            .failure
                            .unwrap_or_else(|| "task reported failure".to_string());
                        self.fail_task(name, kind, message);
                        StepOutcome::Finished(ExecutionStatus::Failed)
                    }
                }
            }
            Err(error) => {
                let message = format!("{}: {}", error.kind.as_str(), error.message);
                self.fail_task(name, kind, message);
                StepOutcome::Finished(ExecutionStatus::Failed)
            }
        }
    }

    /// Fails the stage because the scheduler's timeout elapsed.
    pub fn fail_timed_out(&mut self, elapsed: Duration) {
        if self.execution.is_terminal() {
            return;
        }

        let task = self
            .execution
            .current_task_index()
            .map(|index| self.execution.tasks[index].name.clone());
        let message = format!(
            "stage did not complete within {} ms",
            elapsed.as_millis()
        );
        tracing::warn!(
            execution_id = self.execution.id.0,
            stage_type = %self.execution.stage_type,
            task = task.as_deref().unwrap_or("-"),
            "stage timed out"
        );
        self.execution.fail(task, CoreErrorKind::Timeout, message);
    }

    fn fail_task(&mut self, name: String, kind: TaskKind, message: String) {
        let failure_kind = match kind {
            TaskKind::Monitor => CoreErrorKind::OperationFailed,
            TaskKind::Action | TaskKind::Synchronous => CoreErrorKind::ActionFailed,
        };
        tracing::warn!(
            execution_id = self.execution.id.0,
            stage_type = %self.execution.stage_type,
            task = %name,
            kind = failure_kind.as_str(),
            message = %message,
            "stage failed"
        );
        self.execution.fail(Some(name), failure_kind, message);
    }

    fn finish_succeeded(&mut self) {
        self.execution.status = ExecutionStatus::Succeeded;
        self.execution.finished_at = Some(timestamp_now());
        tracing::info!(
            execution_id = self.execution.id.0,
            stage_type = %self.execution.stage_type,
            "stage succeeded"
        );
    }
}
