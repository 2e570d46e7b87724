use std::sync::Arc;

use crate::models::CoreResult;
use crate::providers::{Provider, ProviderOrder};

type StrategyFactory<S> = Arc<dyn Fn(&str) -> CoreResult<S> + Send + Sync>;
type ContextPredicate<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// Supports targets starting with one of its prefixes and builds a strategy
/// per target through a factory.
pub struct TargetPatternProvider<C, S> {
    name: String,
    order: ProviderOrder,
    prefixes: Vec<String>,
    context_predicate: Option<ContextPredicate<C>>,
    factory: StrategyFactory<S>,
}

impl<C, S> TargetPatternProvider<C, S> {
    pub fn new(
        name: impl Into<String>,
        order: ProviderOrder,
        factory: impl Fn(&str) -> CoreResult<S> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            order,
            prefixes: Vec::new(),
            context_predicate: None,
            factory: Arc::new(factory),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Additionally requires the context to satisfy `predicate`.
    pub fn with_context_predicate(
        mut self,
        predicate: impl Fn(&C) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.context_predicate = Some(Arc::new(predicate));
        self
    }

    pub fn matches_target(&self, target: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| target.starts_with(prefix.as_str()))
    }
}

impl<C: 'static, S> Provider for TargetPatternProvider<C, S> {
    type Context = C;
    type Strategy = S;

    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> ProviderOrder {
        self.order
    }

    fn supports(&self, target: &str, context: &C) -> bool {
        self.matches_target(target)
            && self
                .context_predicate
                .as_ref()
                .is_none_or(|predicate| predicate(context))
    }

    fn resolve(&self, target: &str) -> CoreResult<S> {
        (self.factory)(target)
    }
}
