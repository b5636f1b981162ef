use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use tracing::debug;

use super::{ConfigurationLookup, ConfigurationSource, ServiceConfiguration};
use crate::descriptors::TypeRef;

type TypeMap = HashMap<TypeRef, Arc<ServiceConfiguration>, RandomState>;

fn find(map: &TypeMap, ty: &TypeRef) -> Option<Arc<ServiceConfiguration>> {
    map.get(ty)
        .or_else(|| ty.to_definition().and_then(|def| map.get(&def)))
        .cloned()
}

/// In-memory configuration: a default section plus one section per contract.
///
/// Contract names are matched case-insensitively. A closed generic type falls back
/// to the configuration of its open definition.
#[derive(Default, Clone)]
pub struct ConfigurationRegistry {
    defaults: TypeMap,
    contracts: HashMap<String, TypeMap, RandomState>,
    unions: HashMap<String, Vec<String>, RandomState>,
}

impl ConfigurationRegistry {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }
}

impl ConfigurationSource for ConfigurationRegistry {
    fn lookup(&self, ty: &TypeRef, contracts: &[String]) -> Option<ConfigurationLookup> {
        for contract in contracts.iter().rev() {
            let Some(section) = self.contracts.get(&contract.to_ascii_lowercase()) else {
                continue;
            };
            if let Some(configuration) = find(section, ty) {
                return Some(ConfigurationLookup {
                    configuration,
                    used_contract: Some(contract.clone()),
                });
            }
        }
        find(&self.defaults, ty).map(|configuration| ConfigurationLookup {
            configuration,
            used_contract: None,
        })
    }

    fn contract_union(&self, name: &str) -> Option<Vec<String>> {
        self.unions.get(&name.to_ascii_lowercase()).cloned()
    }

    fn knows_contract(&self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        self.contracts.contains_key(&key) || self.unions.contains_key(&key)
    }
}

impl std::fmt::Debug for ConfigurationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationRegistry")
            .field("defaults", &self.defaults.len())
            .field("contracts", &self.contracts.keys().collect::<Vec<_>>())
            .field("unions", &self.unions)
            .finish()
    }
}

/// Mutable view of one contract's section.
pub struct ContractConfiguration<'a> {
    section: &'a mut TypeMap,
}

impl<'a> ContractConfiguration<'a> {
    pub fn configure(&mut self, ty: TypeRef, configuration: ServiceConfiguration) -> &mut Self {
        self.section.insert(ty, Arc::new(configuration));
        self
    }
}

/// Collects configuration sections into a [`ConfigurationRegistry`].
#[derive(Default)]
pub struct ConfigurationBuilder {
    registry: ConfigurationRegistry,
}

impl ConfigurationBuilder {
    /// Configures `ty` in the default section.
    pub fn configure(&mut self, ty: TypeRef, configuration: ServiceConfiguration) -> &mut Self {
        self.registry.defaults.insert(ty, Arc::new(configuration));
        self
    }

    /// Declares a contract and fills its section.
    pub fn contract<F>(&mut self, name: &str, fill: F) -> &mut Self
    where
        F: FnOnce(&mut ContractConfiguration<'_>),
    {
        let section = self
            .registry
            .contracts
            .entry(name.to_ascii_lowercase())
            .or_default();
        fill(&mut ContractConfiguration { section });
        self
    }

    /// Declares `name` as the union of `members`.
    pub fn union_contract<I, S>(&mut self, name: &str, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        debug!(union = name, ?members, "declared contract union");
        self.registry.unions.insert(name.to_ascii_lowercase(), members);
        self
    }

    pub fn build(self) -> ConfigurationRegistry {
        self.registry
    }
}

/// Two sources where `overrides` shadows `base`.
pub struct LayeredConfiguration {
    overrides: Arc<dyn ConfigurationSource>,
    base: Arc<dyn ConfigurationSource>,
}

impl LayeredConfiguration {
    pub fn new(overrides: Arc<dyn ConfigurationSource>, base: Arc<dyn ConfigurationSource>) -> Self {
        Self { overrides, base }
    }
}

impl ConfigurationSource for LayeredConfiguration {
    fn lookup(&self, ty: &TypeRef, contracts: &[String]) -> Option<ConfigurationLookup> {
        self.overrides
            .lookup(ty, contracts)
            .or_else(|| self.base.lookup(ty, contracts))
    }

    fn contract_union(&self, name: &str) -> Option<Vec<String>> {
        self.overrides
            .contract_union(name)
            .or_else(|| self.base.contract_union(name))
    }

    fn knows_contract(&self, name: &str) -> bool {
        self.overrides.knows_contract(name) || self.base.knows_contract(name)
    }
}
