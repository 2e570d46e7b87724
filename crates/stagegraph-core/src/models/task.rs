use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier a stage definition uses to bind a graph node to a task implementation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Performs the side-effecting call and leaves a handle in the context.
    Action,
    /// Polls the handle left by the preceding action until it is terminal.
    Monitor,
    Synchronous,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Monitor => "monitor",
            Self::Synchronous => "synchronous",
        }
    }
}

/// Status a task reports for a single invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub outputs: Map<String, Value>,
    pub failure: Option<String>,
}

impl TaskResult {
    pub fn running() -> Self {
        Self::with_status(TaskStatus::Running)
    }

    pub fn succeeded() -> Self {
        Self::with_status(TaskStatus::Succeeded)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::with_status(TaskStatus::Failed)
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            outputs: Map::new(),
            failure: None,
        }
    }
}
