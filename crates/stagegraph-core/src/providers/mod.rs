//! Ordered, capability-based provider resolution.
//!
//! A [`ProviderRegistry`] is populated once at startup and then only read.
//! Resolution walks providers in ascending order and returns the strategy of
//! the first provider whose `supports` check accepts the target and context.
//! Explicitly ordered providers come before unordered ones; ties keep
//! registration order. A catch-all provider must sit after every provider of
//! its context type unless the registry is built with
//! [`CatchAllPolicy::AllowAnywhere`].
//!
//! Implementations of [`Provider`] are called concurrently when the registry is
//! shared across threads and must be thread-safe.

pub mod shared;
pub mod target;

pub use shared::SharedStrategyProvider;
pub use target::TargetPatternProvider;

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::models::{CoreError, CoreErrorKind, CoreResult};

#[derive(Clone, Copy, Eq)]
pub struct ContextType {
    id: TypeId,
    name: &'static str,
}

impl ContextType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ContextType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Debug for ContextType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextType({})", self.name)
    }
}

impl Display for ContextType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ProviderOrder {
    Explicit(i32),
    Unordered,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CatchAllPolicy {
    #[default]
    RequireLast,
    AllowAnywhere,
}

pub trait Provider: Send + Sync {
    type Context: 'static;
    type Strategy;

    fn name(&self) -> &str;

    fn order(&self) -> ProviderOrder {
        ProviderOrder::Unordered
    }

    /// True when `supports` accepts every target and context.
    fn is_catch_all(&self) -> bool {
        false
    }

    fn context_type(&self) -> ContextType {
        ContextType::of::<Self::Context>()
    }

    fn supports(&self, target: &str, context: &Self::Context) -> bool;

    fn resolve(&self, target: &str) -> CoreResult<Self::Strategy>;
}

trait RegisteredProvider<S>: Send + Sync {
    fn provider_name(&self) -> &str;

    fn provider_order(&self) -> ProviderOrder;

    fn catch_all(&self) -> bool;

    fn declared_context_type(&self) -> ContextType;

    fn supports_any(&self, target: &str, context: &dyn Any) -> bool;

    fn resolve_strategy(&self, target: &str) -> CoreResult<S>;
}

impl<P: Provider> RegisteredProvider<P::Strategy> for P {
    fn provider_name(&self) -> &str {
        self.name()
    }

    fn provider_order(&self) -> ProviderOrder {
        self.order()
    }

    fn catch_all(&self) -> bool {
        self.is_catch_all()
    }

    fn declared_context_type(&self) -> ContextType {
        self.context_type()
    }

    fn supports_any(&self, target: &str, context: &dyn Any) -> bool {
        context
            .downcast_ref::<P::Context>()
            .is_some_and(|context| self.supports(target, context))
    }

    fn resolve_strategy(&self, target: &str) -> CoreResult<P::Strategy> {
        self.resolve(target)
    }
}

struct ProviderEntry<S> {
    provider: Arc<dyn RegisteredProvider<S>>,
    order: ProviderOrder,
    registration_index: usize,
}

impl<S> Clone for ProviderEntry<S> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            order: self.order,
            registration_index: self.registration_index,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolution<S> {
    pub provider: String,
    pub strategy: S,
}

pub struct ProviderRegistryBuilder<S> {
    entries: Vec<ProviderEntry<S>>,
    catch_all_policy: CatchAllPolicy,
}

impl<S: 'static> ProviderRegistryBuilder<S> {
    pub fn register<P>(self, provider: P) -> Self
    where
        P: Provider<Strategy = S> + 'static,
    {
        let order = provider.order();
        self.register_shared(Arc::new(provider), order)
    }

    /// Registers with an order that overrides the provider's own.
    pub fn register_with_order<P>(self, provider: P, order: ProviderOrder) -> Self
    where
        P: Provider<Strategy = S> + 'static,
    {
        self.register_shared(Arc::new(provider), order)
    }

    pub fn register_arc<P>(self, provider: Arc<P>) -> Self
    where
        P: Provider<Strategy = S> + 'static,
    {
        let order = provider.order();
        self.register_shared(provider, order)
    }

    pub fn catch_all_policy(mut self, policy: CatchAllPolicy) -> Self {
        self.catch_all_policy = policy;
        self
    }

    pub fn build(self) -> CoreResult<ProviderRegistry<S>> {
        let mut names = HashSet::new();
        for entry in &self.entries {
            let name = entry.provider.provider_name();
            if !names.insert(name) {
                return Err(CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("duplicate provider registration '{name}'"),
                ));
            }
        }

        let mut entries = self.entries;
        entries.sort_by_key(|entry| (entry.order, entry.registration_index));

        // A catch-all only has to trail providers of its own context type.
        if self.catch_all_policy == CatchAllPolicy::RequireLast
            && let Some(misplaced) = misplaced_catch_all(&entries)
        {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!(
                    "catch-all provider '{}' must be ordered after every other provider \
                     of context type '{}'",
                    misplaced.provider.provider_name(),
                    misplaced.provider.declared_context_type()
                ),
            ));
        }

        Ok(ProviderRegistry { entries })
    }

    fn register_shared(
        mut self,
        provider: Arc<dyn RegisteredProvider<S>>,
        order: ProviderOrder,
    ) -> Self {
        let registration_index = self.entries.len();
        self.entries.push(ProviderEntry {
            provider,
            order,
            registration_index,
        });
        self
    }
}

fn misplaced_catch_all<S>(entries: &[ProviderEntry<S>]) -> Option<&ProviderEntry<S>> {
    entries.iter().enumerate().find_map(|(index, entry)| {
        let context_type = entry.provider.declared_context_type();
        let shadows_later = entry.provider.catch_all()
            && entries[index + 1..]
                .iter()
                .any(|later| later.provider.declared_context_type() == context_type);
        shadows_later.then_some(entry)
    })
}

/// Immutable, ordered provider set. Cloning shares the providers.
pub struct ProviderRegistry<S> {
    entries: Vec<ProviderEntry<S>>,
}

impl<S> Clone for ProviderRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<S: 'static> ProviderRegistry<S> {
    pub fn builder() -> ProviderRegistryBuilder<S> {
        ProviderRegistryBuilder {
            entries: Vec::new(),
            catch_all_policy: CatchAllPolicy::default(),
        }
    }

    /// Provider names in resolution order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.provider.provider_name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_catch_all(&self) -> bool {
        self.entries.iter().any(|entry| entry.provider.catch_all())
    }

    /// First-match resolution; evaluated fresh on every call.
    pub fn resolve<C: 'static>(&self, target: &str, context: &C) -> CoreResult<Resolution<S>> {
        let requested = ContextType::of::<C>();
        let mut incompatible: Option<(&str, ContextType)> = None;
        let mut compatible_seen = false;

        for entry in &self.entries {
            let provider = entry.provider.as_ref();
            let declared = provider.declared_context_type();
            if declared != requested {
                tracing::trace!(
                    provider = provider.provider_name(),
                    declared = declared.name(),
                    requested = requested.name(),
                    "skipping provider with incompatible context type"
                );
                incompatible.get_or_insert((provider.provider_name(), declared));
                continue;
            }
            compatible_seen = true;

            if !provider.supports_any(target, context as &dyn Any) {
                continue;
            }

            let strategy = provider.resolve_strategy(target).map_err(|error| CoreError {
                message: format!(
                    "provider '{}' failed to resolve target '{target}': {}",
                    provider.provider_name(),
                    error.message
                ),
                ..error
            })?;
            tracing::debug!(
                provider = provider.provider_name(),
                target,
                "resolved provider"
            );
            return Ok(Resolution {
                provider: provider.provider_name().to_string(),
                strategy,
            });
        }

        match incompatible {
            Some((name, declared)) if !compatible_seen => Err(CoreError::new(
                CoreErrorKind::IncompatibleContextType,
                format!(
                    "provider '{name}' declares context type '{declared}' but resolution for \
                     target '{target}' was requested with '{requested}'"
                ),
            )),
            _ => Err(CoreError::new(
                CoreErrorKind::NoMatchingProvider,
                format!("no provider supports target '{target}'"),
            )),
        }
    }

    pub fn resolve_strategy<C: 'static>(&self, target: &str, context: &C) -> CoreResult<S> {
        self.resolve(target, context)
            .map(|resolution| resolution.strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextType, ProviderOrder};

    #[test]
    fn context_types_compare_by_type_identity() {
        assert_eq!(ContextType::of::<String>(), ContextType::of::<String>());
        assert_ne!(ContextType::of::<String>(), ContextType::of::<&'static str>());
        assert!(ContextType::of::<String>().name().ends_with("String"));
    }

    #[test]
    fn explicit_orders_sort_before_unordered() {
        let mut orders = vec![
            ProviderOrder::Unordered,
            ProviderOrder::Explicit(10),
            ProviderOrder::Explicit(-5),
            ProviderOrder::Unordered,
            ProviderOrder::Explicit(0),
        ];
        orders.sort();

        assert_eq!(
            orders,
            vec![
                ProviderOrder::Explicit(-5),
                ProviderOrder::Explicit(0),
                ProviderOrder::Explicit(10),
                ProviderOrder::Unordered,
                ProviderOrder::Unordered,
            ]
        );
    }
}
