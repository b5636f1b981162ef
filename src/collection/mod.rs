//! Service collection module.
//!
//! This module contains the [`ServiceCollection`] type used to declare types,
//! configuration and contracts before building a [`Container`].

use std::sync::Arc;

use tracing::debug;

use crate::config::{ContainerSettings, ParameterSource};
use crate::configuration::{ConfigurationBuilder, ContractConfiguration, ServiceConfiguration};
use crate::container::{default_strategies, InstantiationStrategy};
use crate::descriptors::{TypeDef, TypeRef};
use crate::error::{ContainerError, DiResult};
use crate::factories::ResourceProvider;
use crate::generics::GenericCloser;
use crate::registration::TypeUniverse;
use crate::Container;

pub mod module_system;
pub use module_system::*;

/// Registration surface: type definitions, per-type configuration, contracts and
/// the external sources a container reads from.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Constructor, Resolver, ServiceCollection, ServiceConfiguration, TypeDef, TypeRef};
///
/// struct Endpoint { url: String }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_type(TypeDef::concrete("Endpoint").with_type::<Endpoint>().constructor(Constructor::new(
///         vec![ferrous_resolve::Parameter::service("url", TypeRef::named("String"))],
///         |args| Ok(Endpoint { url: args.value::<String>("url")? }),
///     )))
///     .configure(
///         TypeRef::named("Endpoint"),
///         ServiceConfiguration::new().dependency_value("url", "http://default".to_string()),
///     )
///     .contract("staging", |c| {
///         c.configure(
///             TypeRef::named("Endpoint"),
///             ServiceConfiguration::new().dependency_value("url", "http://staging".to_string()),
///         );
///     });
///
/// let container = services.build();
/// assert_eq!(container.get::<Endpoint>().unwrap().url, "http://default");
/// assert_eq!(container.get_in::<Endpoint>(&["staging"]).unwrap().url, "http://staging");
/// ```
pub struct ServiceCollection {
    universe: TypeUniverse,
    configuration: ConfigurationBuilder,
    settings: ContainerSettings,
    parameters: Vec<Arc<dyn ParameterSource>>,
    resources: Option<Arc<dyn ResourceProvider>>,
    strategies: Vec<Box<dyn InstantiationStrategy>>,
}

impl ServiceCollection {
    /// Creates a collection that already knows the simple value types and the
    /// container itself.
    pub fn new() -> Self {
        Self {
            universe: TypeUniverse::new(),
            configuration: ConfigurationBuilder::default(),
            settings: ContainerSettings::default(),
            parameters: Vec::new(),
            resources: None,
            strategies: Vec::new(),
        }
    }

    /// Adds a type definition; a definition with the same name is replaced.
    pub fn add_type(&mut self, def: TypeDef) -> &mut Self {
        self.universe.insert(def);
        self
    }

    /// Adds a type definition, rejecting a name that is already registered.
    pub fn try_add_type(&mut self, def: TypeDef) -> DiResult<&mut Self> {
        if self.universe.contains(def.name()) {
            return Err(ContainerError::Registration(format!(
                "type [{}] is already registered",
                def.name()
            )));
        }
        Ok(self.add_type(def))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.universe.contains(name)
    }

    /// Configures `ty` outside of any contract.
    pub fn configure(&mut self, ty: TypeRef, configuration: ServiceConfiguration) -> &mut Self {
        self.configuration.configure(ty, configuration);
        self
    }

    /// Declares a contract and fills its configuration section.
    pub fn contract<F>(&mut self, name: &str, fill: F) -> &mut Self
    where
        F: FnOnce(&mut ContractConfiguration<'_>),
    {
        self.configuration.contract(name, fill);
        self
    }

    /// Declares `name` as the union of `members`; requesting a service under it
    /// resolves once per member and merges the results.
    pub fn union_contract<I, S>(&mut self, name: &str, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration.union_contract(name, members);
        self
    }

    pub fn settings(&mut self, settings: ContainerSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Only implementors whose module starts with `prefix` are discovered.
    pub fn module_filter(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.settings.module_prefixes.push(prefix.into());
        self
    }

    /// Adds a source of simple parameter values; earlier sources win.
    pub fn parameters(&mut self, source: impl ParameterSource + 'static) -> &mut Self {
        self.parameters.push(Arc::new(source));
        self
    }

    pub fn resources(&mut self, provider: impl ResourceProvider + 'static) -> &mut Self {
        self.resources = Some(Arc::new(provider));
        self
    }

    /// Adds an instantiation strategy consulted before the built-in ones.
    pub fn strategy(&mut self, strategy: impl InstantiationStrategy + 'static) -> &mut Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Freezes the registrations into a container.
    pub fn build(self) -> Container {
        let mut universe = self.universe;
        universe.set_module_prefixes(self.settings.module_prefixes.clone());
        universe.finalize();
        let mut strategies = self.strategies;
        strategies.extend(default_strategies());
        let configuration = self.configuration.build();
        debug!(types = universe.iter().count(), ?configuration, "building container");
        Container::new(
            Arc::new(universe),
            Arc::new(configuration),
            Arc::new(GenericCloser::new()),
            self.settings,
            self.parameters,
            self.resources,
            Arc::new(strategies),
        )
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}
