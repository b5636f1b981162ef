//! Per-type configuration consulted while building services.
//!
//! A [`ServiceConfiguration`] overrides how one type is produced under one contract:
//! a fixed instance, a factory, an explicit implementation list, per-dependency
//! values, an instance filter, or "ignore this type entirely".

mod registry;

pub use registry::{
    ConfigurationBuilder, ConfigurationRegistry, ContractConfiguration, LayeredConfiguration,
};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::container::ResolverContext;
use crate::descriptors::{AnyArc, TypeRef};
use crate::error::BoxError;

/// Configured factory producing an instance from the active resolver context.
pub type FactoryFn =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> Result<AnyArc, BoxError> + Send + Sync>;

/// Predicate deciding whether a built instance is kept.
pub type InstanceFilter = Arc<dyn Fn(&AnyArc) -> bool + Send + Sync>;

fn typed_factory<T, F>(factory: F) -> FactoryFn
where
    T: Any + Send + Sync,
    F: for<'a> Fn(&ResolverContext<'a>) -> Result<T, BoxError> + Send + Sync + 'static,
{
    Arc::new(move |ctx: &ResolverContext<'_>| factory(ctx).map(|v| Arc::new(v) as AnyArc))
}

#[derive(Clone)]
pub(crate) struct ConfiguredInstance {
    pub(crate) value: AnyArc,
    /// Owned instances are disposed with the container.
    pub(crate) owned: bool,
}

/// Which parameters a [`DependencyConfiguration`] applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyKey {
    Name(String),
    Type(TypeRef),
}

/// Override for one constructor dependency.
#[derive(Clone)]
pub struct DependencyConfiguration {
    pub(crate) key: DependencyKey,
    pub(crate) value: Option<(AnyArc, String)>,
    pub(crate) factory: Option<FactoryFn>,
    pub(crate) implementation: Option<TypeRef>,
}

impl DependencyConfiguration {
    fn new(key: DependencyKey) -> Self {
        Self { key, value: None, factory: None, implementation: None }
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }
}

impl fmt::Debug for DependencyConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyConfiguration")
            .field("key", &self.key)
            .field("value", &self.value.as_ref().map(|(_, d)| d))
            .field("factory", &self.factory.is_some())
            .field("implementation", &self.implementation)
            .finish()
    }
}

/// Overrides for one type under one contract (or the default contract-less scope).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ServiceConfiguration, TypeRef};
///
/// let config = ServiceConfiguration::new()
///     .dependency_value("port", 8080u16)
///     .implementation(TypeRef::named("PostgresStore"))
///     .comment("production wiring");
/// assert_eq!(config.implementations().map(|i| i.len()), Some(1));
/// ```
#[derive(Clone, Default)]
pub struct ServiceConfiguration {
    pub(crate) instance: Option<ConfiguredInstance>,
    pub(crate) factory: Option<FactoryFn>,
    pub(crate) implementations: Option<Vec<TypeRef>>,
    pub(crate) dependencies: Vec<DependencyConfiguration>,
    pub(crate) instance_filter: Option<InstanceFilter>,
    pub(crate) ignored: bool,
    pub(crate) comment: Option<String>,
}

impl ServiceConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fixed instance, owned (and disposed) by the container.
    pub fn instance<T: Any + Send + Sync>(self, value: T) -> Self {
        self.instance_any(Arc::new(value), true)
    }

    /// A fixed instance owned by the caller; the container never disposes it.
    pub fn external_instance<T: Any + Send + Sync>(self, value: Arc<T>) -> Self {
        self.instance_any(value, false)
    }

    pub fn instance_any(mut self, value: AnyArc, owned: bool) -> Self {
        self.instance = Some(ConfiguredInstance { value, owned });
        self
    }

    pub fn factory<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: for<'a> Fn(&ResolverContext<'a>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.factory = Some(typed_factory(factory));
        self
    }

    pub fn factory_any(mut self, factory: FactoryFn) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Adds a candidate implementation; replaces universe lookup for abstract types.
    pub fn implementation(mut self, ty: TypeRef) -> Self {
        self.implementations.get_or_insert_with(Vec::new).push(ty);
        self
    }

    pub fn dependency_value<T>(self, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        self.dependency_value_by(DependencyKey::Name(name.into()), value)
    }

    /// Value for every parameter whose service type is `ty`.
    pub fn dependency_value_for_type<T>(self, ty: TypeRef, value: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        self.dependency_value_by(DependencyKey::Type(ty), value)
    }

    fn dependency_value_by<T>(mut self, key: DependencyKey, value: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        let display = format!("{:?}", value);
        self.dependency_mut(key).value = Some((Arc::new(value), display));
        self
    }

    pub fn dependency_factory<T, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: for<'a> Fn(&ResolverContext<'a>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.dependency_mut(DependencyKey::Name(name.into())).factory = Some(typed_factory(factory));
        self
    }

    /// Resolves the named parameter as `implementation` instead of its declared type.
    pub fn dependency_implementation(mut self, name: impl Into<String>, implementation: TypeRef) -> Self {
        self.dependency_mut(DependencyKey::Name(name.into())).implementation = Some(implementation);
        self
    }

    pub fn dependency_implementation_for_type(mut self, ty: TypeRef, implementation: TypeRef) -> Self {
        self.dependency_mut(DependencyKey::Type(ty)).implementation = Some(implementation);
        self
    }

    /// Drops built instances for which `keep` returns false.
    ///
    /// Instances that are not a `T` are kept.
    pub fn instance_filter<T, F>(mut self, keep: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.instance_filter = Some(Arc::new(move |value: &AnyArc| {
            value.downcast_ref::<T>().map_or(true, &keep)
        }));
        self
    }

    /// The type is never built; requests yield no instances.
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn implementations(&self) -> Option<&[TypeRef]> {
        self.implementations.as_deref()
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    fn dependency_mut(&mut self, key: DependencyKey) -> &mut DependencyConfiguration {
        let index = match self.dependencies.iter().position(|d| d.key == key) {
            Some(index) => index,
            None => {
                self.dependencies.push(DependencyConfiguration::new(key));
                self.dependencies.len() - 1
            }
        };
        &mut self.dependencies[index]
    }

    /// Override for a parameter: by name first, then by its service type.
    pub(crate) fn dependency_for(
        &self,
        name: &str,
        ty: Option<&TypeRef>,
    ) -> Option<&DependencyConfiguration> {
        self.dependencies
            .iter()
            .find(|d| matches!(&d.key, DependencyKey::Name(n) if n == name))
            .or_else(|| {
                let ty = ty?;
                self.dependencies
                    .iter()
                    .find(|d| matches!(&d.key, DependencyKey::Type(t) if t == ty))
            })
    }
}

impl fmt::Debug for ServiceConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfiguration")
            .field("instance", &self.instance.is_some())
            .field("factory", &self.factory.is_some())
            .field("implementations", &self.implementations)
            .field("dependencies", &self.dependencies)
            .field("ignored", &self.ignored)
            .field("comment", &self.comment)
            .finish()
    }
}

/// Result of a configuration lookup.
#[derive(Debug, Clone)]
pub struct ConfigurationLookup {
    pub configuration: Arc<ServiceConfiguration>,
    /// The contract whose section supplied the configuration; `None` for the default scope.
    pub used_contract: Option<String>,
}

/// Source of per-type configuration and contract declarations.
pub trait ConfigurationSource: Send + Sync {
    /// Configuration for `ty` under the active chain, innermost contract first.
    fn lookup(&self, ty: &TypeRef, contracts: &[String]) -> Option<ConfigurationLookup>;

    /// Members of a union contract.
    fn contract_union(&self, name: &str) -> Option<Vec<String>>;

    /// Whether `name` is a declared contract.
    fn knows_contract(&self, name: &str) -> bool;
}
