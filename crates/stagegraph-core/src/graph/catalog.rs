use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::{StageDefinitionBuilder, TaskGraph};
use crate::models::{CoreError, CoreErrorKind, CoreResult, StageSpec};

/// Stage definitions keyed by stage type, populated once at startup.
#[derive(Clone, Default)]
pub struct StageCatalog {
    definitions: HashMap<String, Arc<dyn StageDefinitionBuilder>>,
}

impl StageCatalog {
    pub fn new(
        definitions: impl IntoIterator<Item = Arc<dyn StageDefinitionBuilder>>,
    ) -> CoreResult<Self> {
        let mut mapped = HashMap::new();
        for definition in definitions {
            let stage_type = definition.stage_type().to_string();
            if mapped.insert(stage_type.clone(), definition).is_some() {
                return Err(CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("duplicate stage definition for stage type '{stage_type}'"),
                )
                .with_stage(stage_type));
            }
        }

        Ok(Self {
            definitions: mapped,
        })
    }

    pub fn has_stage_type(&self, stage_type: &str) -> bool {
        self.definitions.contains_key(stage_type)
    }

    pub fn stage_types(&self) -> Vec<&str> {
        let mut stage_types: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        stage_types.sort_unstable();
        stage_types
    }

    pub fn build(&self, spec: &StageSpec) -> CoreResult<TaskGraph> {
        let definition = self.definitions.get(&spec.stage_type).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("no stage definition is registered for '{}'", spec.stage_type),
            )
            .with_stage(spec.stage_type.as_str())
        })?;

        let graph = definition.build(spec)?;
        tracing::debug!(
            stage_type = %spec.stage_type,
            tasks = graph.len(),
            "built task graph"
        );
        Ok(graph)
    }
}
