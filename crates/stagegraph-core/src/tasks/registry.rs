use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::{TaskGraph, TaskNode};
use crate::models::{CoreError, CoreErrorKind, CoreResult, TaskType};
use crate::tasks::Task;

#[derive(Clone)]
pub struct BoundTask {
    pub node: TaskNode,
    pub task: Arc<dyn Task>,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskType, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new(tasks: impl IntoIterator<Item = Arc<dyn Task>>) -> CoreResult<Self> {
        let mut mapped = HashMap::new();
        for task in tasks {
            let task_type = task.task_type().clone();
            if mapped.contains_key(&task_type) {
                return Err(CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("duplicate task registration for type '{task_type}'"),
                ));
            }
            mapped.insert(task_type, task);
        }

        Ok(Self { tasks: mapped })
    }

    pub fn has_task_type(&self, task_type: &TaskType) -> bool {
        self.tasks.contains_key(task_type)
    }

    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_type).cloned()
    }

    /// Pairs each graph node with its implementation, failing on the first unknown type.
    pub fn bind(&self, graph: &TaskGraph) -> CoreResult<Vec<BoundTask>> {
        graph
            .nodes()
            .iter()
            .map(|node| {
                let task = self.get(&node.task_type).ok_or_else(|| {
                    CoreError::new(
                        CoreErrorKind::InvalidTaskType,
                        format!("no task is registered for type '{}'", node.task_type),
                    )
                    .with_stage(graph.stage_type())
                    .with_task(node.name.as_str())
                })?;
                Ok(BoundTask {
                    node: node.clone(),
                    task,
                })
            })
            .collect()
    }
}
