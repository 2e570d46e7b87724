use std::collections::BTreeMap;

use crate::graph::{TaskGraph, TaskGraphBuilder};
use crate::models::{CoreError, CoreErrorKind, CoreResult, StageSpec, TaskKind, TaskType};

/// Declares the task graph for one stage type.
///
/// Implementations only describe tasks; they must not perform I/O.
pub trait StageDefinitionBuilder: Send + Sync {
    fn stage_type(&self) -> &str;

    fn task_graph(&self, spec: &StageSpec, builder: &mut TaskGraphBuilder) -> CoreResult<()>;

    fn build(&self, spec: &StageSpec) -> CoreResult<TaskGraph> {
        if spec.stage_type != self.stage_type() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!(
                    "stage definition '{}' cannot build a graph for stage type '{}'",
                    self.stage_type(),
                    spec.stage_type
                ),
            )
            .with_stage(spec.stage_type.as_str()));
        }

        let mut builder = TaskGraphBuilder::new(self.stage_type());
        self.task_graph(spec, &mut builder)?;
        builder.build()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskBinding {
    pub name: String,
    pub task_type: TaskType,
}

impl TaskBinding {
    pub fn new(name: impl Into<String>, task_type: impl Into<TaskType>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct ProviderBindings {
    action: TaskBinding,
    monitor: TaskBinding,
}

/// Two-task stage: an action that submits a remote operation followed by a
/// monitor that polls it, with implementations bound per cloud provider.
#[derive(Clone, Debug)]
pub struct SubmitThenMonitorStage {
    stage_type: String,
    bindings: BTreeMap<String, ProviderBindings>,
    default_cloud_provider: Option<String>,
}

impl SubmitThenMonitorStage {
    pub fn new(stage_type: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            bindings: BTreeMap::new(),
            default_cloud_provider: None,
        }
    }

    pub fn bind(
        mut self,
        cloud_provider: impl Into<String>,
        action: TaskBinding,
        monitor: TaskBinding,
    ) -> Self {
        self.bindings
            .insert(cloud_provider.into(), ProviderBindings { action, monitor });
        self
    }

    /// Cloud provider used when the stage spec does not name one.
    pub fn with_default_cloud_provider(mut self, cloud_provider: impl Into<String>) -> Self {
        self.default_cloud_provider = Some(cloud_provider.into());
        self
    }

    pub fn cloud_providers(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl StageDefinitionBuilder for SubmitThenMonitorStage {
    fn stage_type(&self) -> &str {
        &self.stage_type
    }

    fn task_graph(&self, spec: &StageSpec, builder: &mut TaskGraphBuilder) -> CoreResult<()> {
        let cloud_provider = spec
            .cloud_provider
            .as_deref()
            .or(self.default_cloud_provider.as_deref())
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorKind::InvalidInput,
                    "stage spec does not name a cloud provider",
                )
                .with_stage(self.stage_type.as_str())
            })?;

        let bindings = self.bindings.get(cloud_provider).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("no task bindings for cloud provider '{cloud_provider}'"),
            )
            .with_stage(self.stage_type.as_str())
        })?;

        builder
            .with_task(
                bindings.action.name.as_str(),
                bindings.action.task_type.clone(),
                TaskKind::Action,
            )
            .with_task(
                bindings.monitor.name.as_str(),
                bindings.monitor.task_type.clone(),
                TaskKind::Monitor,
            );
        Ok(())
    }
}
