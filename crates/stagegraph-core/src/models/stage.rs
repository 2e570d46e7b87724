use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{
    CLOUD_PROVIDER_KEY, CoreErrorKind, OperationContext, OperationHandle, TaskKind, TaskType,
};

/// Current time truncated to whole milliseconds, the precision the execution
/// store keeps. Every execution and task timestamp is taken through here.
pub fn timestamp_now() -> SystemTime {
    let now = SystemTime::now();
    match now.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => {
            let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            UNIX_EPOCH + Duration::from_millis(millis)
        }
        Err(_) => now,
    }
}

/// Stage request as delivered by the pipeline definition layer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    pub stage_type: String,
    #[serde(default)]
    pub cloud_provider: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl StageSpec {
    pub fn new(stage_type: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            cloud_provider: None,
            context: Map::new(),
        }
    }

    pub fn with_cloud_provider(mut self, cloud_provider: impl Into<String>) -> Self {
        self.cloud_provider = Some(cloud_provider.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn initial_context(&self) -> OperationContext {
        let mut context = OperationContext::from_map(self.context.clone());
        if let Some(cloud_provider) = &self.cloud_provider {
            context.insert(CLOUD_PROVIDER_KEY, cloud_provider.as_str());
        }
        context
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageExecutionId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_started" => Ok(Self::NotStarted),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub name: String,
    pub task_type: TaskType,
    pub kind: TaskKind,
    pub status: ExecutionStatus,
    pub invocations: u32,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
}

/// Diagnostics recorded when a stage fails.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub task: Option<String>,
    pub kind: CoreErrorKind,
    pub message: String,
    pub last_handle: Option<OperationHandle>,
    pub last_remote_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageExecution {
    pub id: StageExecutionId,
    pub stage_type: String,
    pub status: ExecutionStatus,
    pub tasks: Vec<TaskExecution>,
    pub context: OperationContext,
    pub failure: Option<StageFailure>,
    pub created_at: SystemTime,
    pub finished_at: Option<SystemTime>,
}

impl StageExecution {
    pub fn task(&self, name: &str) -> Option<&TaskExecution> {
        self.tasks.iter().find(|task| task.name == name)
    }

    /// Index of the first task that has not reached a terminal status.
    pub fn current_task_index(&self) -> Option<usize> {
        self.tasks.iter().position(|task| !task.status.is_terminal())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Marks the stage failed, snapshotting the handle and remote status from the context.
    pub fn fail(&mut self, task: Option<String>, kind: CoreErrorKind, message: String) {
        let now = timestamp_now();
        if let Some(name) = &task
            && let Some(entry) = self.tasks.iter_mut().find(|entry| &entry.name == name)
            && !entry.status.is_terminal()
        {
            entry.status = ExecutionStatus::Failed;
            entry.finished_at = Some(now);
        }

        self.failure = Some(StageFailure {
            task,
            kind,
            message,
            last_handle: self.context.handle(),
            last_remote_status: self.context.remote_status().map(str::to_string),
        });
        self.status = ExecutionStatus::Failed;
        self.finished_at = Some(now);
    }
}
