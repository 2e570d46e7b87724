use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreErrorKind {
    ActionFailed,
    OperationFailed,
    NoMatchingProvider,
    IncompatibleContextType,
    InvalidTaskType,
    InvalidInput,
    Timeout,
    StorageFailure,
    Internal,
}

impl CoreErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActionFailed => "action_failed",
            Self::OperationFailed => "operation_failed",
            Self::NoMatchingProvider => "no_matching_provider",
            Self::IncompatibleContextType => "incompatible_context_type",
            Self::InvalidTaskType => "invalid_task_type",
            Self::InvalidInput => "invalid_input",
            Self::Timeout => "timeout",
            Self::StorageFailure => "storage_failure",
            Self::Internal => "internal",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub stage: Option<String>,
    pub task: Option<String>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            task: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
