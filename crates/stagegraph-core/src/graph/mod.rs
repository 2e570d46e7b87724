pub mod catalog;
pub mod cloudfoundry;
pub mod definition;

pub use catalog::StageCatalog;
pub use definition::{StageDefinitionBuilder, SubmitThenMonitorStage, TaskBinding};

use std::collections::HashSet;

use crate::models::{CoreError, CoreErrorKind, CoreResult, TaskKind, TaskType};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskNode {
    pub name: String,
    pub task_type: TaskType,
    pub kind: TaskKind,
}

/// Ordered, validated task sequence for one stage.
///
/// Every `Action` node is immediately followed by a `Monitor` node and every
/// `Monitor` node immediately follows an `Action` node, so an asynchronous graph
/// always ends in a terminal monitor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskGraph {
    stage_type: String,
    nodes: Vec<TaskNode>,
}

impl TaskGraph {
    pub fn stage_type(&self) -> &str {
        &self.stage_type
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_asynchronous(&self) -> bool {
        self.nodes.iter().any(|node| node.kind == TaskKind::Monitor)
    }
}

#[derive(Debug)]
pub struct TaskGraphBuilder {
    stage_type: String,
    nodes: Vec<TaskNode>,
}

impl TaskGraphBuilder {
    pub fn new(stage_type: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_task(
        &mut self,
        name: impl Into<String>,
        task_type: impl Into<TaskType>,
        kind: TaskKind,
    ) -> &mut Self {
        self.nodes.push(TaskNode {
            name: name.into(),
            task_type: task_type.into(),
            kind,
        });
        self
    }

    pub fn build(self) -> CoreResult<TaskGraph> {
        validate_nodes(&self.stage_type, &self.nodes)?;
        Ok(TaskGraph {
            stage_type: self.stage_type,
            nodes: self.nodes,
        })
    }
}

fn validate_nodes(stage_type: &str, nodes: &[TaskNode]) -> CoreResult<()> {
    if nodes.is_empty() {
        return Err(graph_error(stage_type, "task graph must declare at least one task"));
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if node.name.trim().is_empty() {
            return Err(graph_error(stage_type, "task names must not be empty"));
        }
        if !seen.insert(node.name.as_str()) {
            return Err(graph_error(
                stage_type,
                format!("duplicate task name '{}'", node.name),
            ));
        }
    }

    for (index, node) in nodes.iter().enumerate() {
        match node.kind {
            TaskKind::Action => {
                let followed_by_monitor = nodes
                    .get(index + 1)
                    .is_some_and(|next| next.kind == TaskKind::Monitor);
                if !followed_by_monitor {
                    return Err(graph_error(
                        stage_type,
                        format!("action task '{}' must be followed by a monitor task", node.name),
                    ));
                }
            }
            TaskKind::Monitor => {
                let preceded_by_action = index
                    .checked_sub(1)
                    .and_then(|previous| nodes.get(previous))
                    .is_some_and(|previous| previous.kind == TaskKind::Action);
                if !preceded_by_action {
                    return Err(graph_error(
                        stage_type,
                        format!("monitor task '{}' must follow an action task", node.name),
                    ));
                }
            }
            TaskKind::Synchronous => {}
        }
    }

    let ends_in_monitor = nodes.last().is_some_and(|last| last.kind == TaskKind::Monitor);
    let asynchronous = nodes.iter().any(|node| node.kind == TaskKind::Monitor);
    if asynchronous && !ends_in_monitor {
        return Err(graph_error(
            stage_type,
            "asynchronous task graph must end in its monitor task",
        ));
    }

    Ok(())
}

fn graph_error(stage_type: &str, message: impl Into<String>) -> CoreError {
    CoreError::new(CoreErrorKind::InvalidInput, message).with_stage(stage_type)
}
