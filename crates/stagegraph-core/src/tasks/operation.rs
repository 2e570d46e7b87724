use std::sync::Arc;

use crate::models::{
    CoreError, CoreErrorKind, CoreResult, HANDLE_KEY, OperationContext, OperationHandle,
    REMOTE_STATUS_KEY, TaskResult, TaskType,
};
use crate::tasks::{Task, TaskOutcome};

/// Remote state of a submitted operation as reported by its backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteOperationState {
    Pending,
    Succeeded,
    Failed { reason: String },
}

impl RemoteOperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

pub trait OperationSubmitter: Send + Sync {
    fn submit(&self, context: &OperationContext) -> CoreResult<OperationHandle>;
}

pub trait OperationStatusSource: Send + Sync {
    fn status(
        &self,
        handle: &OperationHandle,
        context: &OperationContext,
    ) -> CoreResult<RemoteOperationState>;
}

impl<T: OperationSubmitter + ?Sized> OperationSubmitter for Arc<T> {
    fn submit(&self, context: &OperationContext) -> CoreResult<OperationHandle> {
        self.as_ref().submit(context)
    }
}

impl<T: OperationStatusSource + ?Sized> OperationStatusSource for Arc<T> {
    fn status(
        &self,
        handle: &OperationHandle,
        context: &OperationContext,
    ) -> CoreResult<RemoteOperationState> {
        self.as_ref().status(handle, context)
    }
}

/// Action task: submits the operation and records its handle without waiting.
pub struct SubmitOperationTask<S: OperationSubmitter> {
    task_type: TaskType,
    submitter: S,
}

impl<S: OperationSubmitter> SubmitOperationTask<S> {
    pub fn new(task_type: impl Into<TaskType>, submitter: S) -> Self {
        Self {
            task_type: task_type.into(),
            submitter,
        }
    }
}

impl<S: OperationSubmitter> Task for SubmitOperationTask<S> {
    fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    fn execute(&self, context: &OperationContext) -> TaskOutcome {
        let handle = self.submitter.submit(context)?;
        tracing::debug!(
            task_type = %self.task_type,
            handle = %handle,
            "submitted remote operation"
        );
        Ok(TaskResult::succeeded()
            .with_output(HANDLE_KEY, handle.as_str())
            .with_output(REMOTE_STATUS_KEY, RemoteOperationState::Pending.as_str()))
    }
}

/// Monitor task: one status check per invocation against the handle in context.
pub struct MonitorOperationTask<S: OperationStatusSource> {
    task_type: TaskType,
    source: S,
}

impl<S: OperationStatusSource> MonitorOperationTask<S> {
    pub fn new(task_type: impl Into<TaskType>, source: S) -> Self {
        Self {
            task_type: task_type.into(),
            source,
        }
    }
}

impl<S: OperationStatusSource> Task for MonitorOperationTask<S> {
    fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    fn execute(&self, context: &OperationContext) -> TaskOutcome {
        let handle = context.handle().ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("context does not contain '{HANDLE_KEY}' to monitor"),
            )
        })?;

        let state = self.source.status(&handle, context)?;
        let result = match &state {
            RemoteOperationState::Pending => TaskResult::running(),
            RemoteOperationState::Succeeded => TaskResult::succeeded(),
            RemoteOperationState::Failed { reason } => TaskResult::failed(reason.as_str()),
        };
        Ok(result.with_output(REMOTE_STATUS_KEY, state.as_str()))
    }
}
