use std::marker::PhantomData;

use crate::models::CoreResult;
use crate::providers::{Provider, ProviderOrder};

/// Catch-all provider handing out one shared strategy, such as a client the
/// caller constructed at startup. Sorts last as an unordered provider.
pub struct SharedStrategyProvider<C, S> {
    name: String,
    strategy: S,
    _context: PhantomData<fn(&C)>,
}

impl<C, S: Clone> SharedStrategyProvider<C, S> {
    pub fn new(name: impl Into<String>, strategy: S) -> Self {
        Self {
            name: name.into(),
            strategy,
            _context: PhantomData,
        }
    }
}

impl<C, S> Provider for SharedStrategyProvider<C, S>
where
    C: 'static,
    S: Clone + Send + Sync,
{
    type Context = C;
    type Strategy = S;

    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> ProviderOrder {
        ProviderOrder::Unordered
    }

    fn is_catch_all(&self) -> bool {
        true
    }

    fn supports(&self, _target: &str, _context: &C) -> bool {
        true
    }

    fn resolve(&self, _target: &str) -> CoreResult<S> {
        Ok(self.strategy.clone())
    }
}
