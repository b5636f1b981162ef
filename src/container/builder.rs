//! Mutable state of a service while it is being built.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::configuration::ServiceConfiguration;
use crate::descriptors::{AnyArc, Argument, Arguments, CastFn, InstanceHook, TypeRef};
use crate::error::SharedError;
use crate::key::{contains_contract, ServiceName};
use crate::record::{
    ServiceDependency, ServiceError, ServiceInstance, ServiceRecord, ServiceStatus,
};

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

/// Accumulates the outcome of one build; turned into a [`ServiceRecord`] by `finish`.
pub(crate) struct ServiceBuilder {
    pub(crate) id: u64,
    pub(crate) declared: ServiceName,
    pub(crate) create_new: bool,
    pub(crate) status: ServiceStatus,
    pub(crate) instances: Vec<ServiceInstance>,
    pub(crate) dependencies: Vec<ServiceDependency>,
    pub(crate) used_contracts: Vec<String>,
    pub(crate) comment: Option<String>,
    pub(crate) error: Option<ServiceError>,
    pub(crate) configuration: Option<Arc<ServiceConfiguration>>,
    arguments: Vec<(Argument, bool)>,
    linked: Vec<usize>,
}

impl ServiceBuilder {
    pub(crate) fn new(declared: ServiceName, arguments: Option<Arguments>, create_new: bool) -> Self {
        Self {
            id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            declared,
            create_new,
            status: ServiceStatus::Ok,
            instances: Vec::new(),
            dependencies: Vec::new(),
            used_contracts: Vec::new(),
            comment: None,
            error: None,
            configuration: None,
            arguments: arguments
                .map(|a| a.entries.into_iter().map(|arg| (arg, false)).collect())
                .unwrap_or_default(),
            linked: Vec::new(),
        }
    }

    pub(crate) fn ty(&self) -> &TypeRef {
        self.declared.ty()
    }

    pub(crate) fn is_bad(&self) -> bool {
        self.status.is_bad()
    }

    pub(crate) fn use_contract(&mut self, name: &str) {
        if !contains_contract(&self.used_contracts, name) {
            self.used_contracts.push(name.to_string());
        }
    }

    pub(crate) fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.status = ServiceStatus::Error;
        self.error = Some(ServiceError::new(message));
    }

    pub(crate) fn set_error_with_source(&mut self, message: impl Into<String>, source: SharedError) {
        self.status = ServiceStatus::Error;
        self.error = Some(ServiceError::with_source(message, source));
    }

    pub(crate) fn not_resolved(&mut self, comment: impl Into<String>) {
        if !self.is_bad() {
            self.status = ServiceStatus::NotResolved;
        }
        self.comment = Some(comment.into());
    }

    /// Records an edge. The first bad edge turns this builder into a dependency error.
    pub(crate) fn add_dependency(&mut self, dependency: ServiceDependency) {
        if let Some(record) = dependency.record() {
            for contract in record.used_contracts() {
                if !contains_contract(&self.used_contracts, contract) {
                    self.used_contracts.push(contract.clone());
                }
            }
        }
        if dependency.status.is_bad() && !self.is_bad() {
            self.status = ServiceStatus::DependencyError;
        }
        self.dependencies.push(dependency);
    }

    pub(crate) fn add_instance(&mut self, value: AnyArc, owned: bool) {
        if self.status == ServiceStatus::NotResolved {
            self.status = ServiceStatus::Ok;
        }
        self.instances.push(ServiceInstance { value, owned });
    }

    /// Merges a child's instances into this record, viewed through `cast`.
    ///
    /// Merged instances are never owned here; the child record disposes them.
    pub(crate) fn link_to(&mut self, child: Arc<ServiceRecord>, cast: Option<&CastFn>) {
        if !child.status.is_bad() {
            for instance in &child.instances {
                let address = Arc::as_ptr(&instance.value) as *const () as usize;
                if self.linked.contains(&address) {
                    continue;
                }
                self.linked.push(address);
                let value = cast
                    .and_then(|cast| cast(&instance.value))
                    .unwrap_or_else(|| instance.value.clone());
                self.instances.push(ServiceInstance { value, owned: false });
            }
        }
        let label = child.name.ty().to_string();
        self.add_dependency(ServiceDependency::service(label, child));
    }

    /// Takes a call-time argument by parameter name, marking it used.
    pub(crate) fn take_argument(&mut self, name: &str) -> Option<(AnyArc, String)> {
        self.arguments
            .iter_mut()
            .find(|(arg, _)| arg.name == name)
            .map(|(arg, used)| {
                *used = true;
                (arg.value.clone(), arg.display.clone())
            })
    }

    pub(crate) fn arguments(&self) -> Option<Arguments> {
        if self.arguments.is_empty() {
            return None;
        }
        Some(Arguments { entries: self.arguments.iter().map(|(a, _)| a.clone()).collect() })
    }

    pub(crate) fn mark_arguments_used(&mut self) {
        for (_, used) in &mut self.arguments {
            *used = true;
        }
    }

    pub(crate) fn unused_arguments(&self) -> Vec<&str> {
        self.arguments
            .iter()
            .filter(|(_, used)| !used)
            .map(|(arg, _)| arg.name.as_str())
            .collect()
    }

    /// Applies the configured instance filter.
    pub(crate) fn apply_instance_filter(&mut self) {
        let Some(filter) = self.configuration.as_ref().and_then(|c| c.instance_filter.clone()) else {
            return;
        };
        let before = self.instances.len();
        self.instances.retain(|instance| filter(&instance.value));
        if self.instances.len() != before {
            self.set_comment("instance filter");
            if self.instances.is_empty() && self.status == ServiceStatus::Ok {
                self.status = ServiceStatus::NotResolved;
            }
        }
    }

    /// Freezes the builder. Only contracts of `chain` that were consumed are kept, in
    /// chain order.
    pub(crate) fn finish(self, chain: &[String], index: u64, disposer: Option<InstanceHook>) -> ServiceRecord {
        let used: Vec<String> = chain
            .iter()
            .filter(|c| contains_contract(&self.used_contracts, c))
            .cloned()
            .collect();
        ServiceRecord {
            name: ServiceName::new(self.declared.ty().clone(), used),
            status: self.status,
            instances: self.instances,
            dependencies: self.dependencies,
            comment: self.comment,
            error: self.error,
            construction_index: index,
            disposer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(contracts: &[&str]) -> ServiceBuilder {
        ServiceBuilder::new(
            ServiceName::new(TypeRef::named("X"), contracts.iter().map(|c| c.to_string()).collect()),
            None,
            false,
        )
    }

    fn leaf(contracts: &[&str], status: ServiceStatus) -> Arc<ServiceRecord> {
        let mut b = builder(contracts);
        for c in contracts {
            b.use_contract(c);
        }
        b.status = status;
        b.add_instance(Arc::new(1u8), true);
        let chain: Vec<String> = contracts.iter().map(|c| c.to_string()).collect();
        Arc::new(b.finish(&chain, 0, None))
    }

    #[test]
    fn unconsumed_contracts_collapse() {
        let b = builder(&["a", "b"]);
        let record = b.finish(&["a".to_string(), "b".to_string()], 1, None);
        assert!(record.used_contracts().is_empty());
    }

    #[test]
    fn consumed_contracts_follow_chain_order() {
        let mut b = builder(&["a", "b"]);
        b.add_dependency(ServiceDependency::service("child", leaf(&["b"], ServiceStatus::Ok)));
        b.use_contract("A");
        let record = b.finish(&["a".to_string(), "b".to_string()], 1, None);
        assert_eq!(record.used_contracts(), ["a", "b"]);
    }

    #[test]
    fn bad_child_marks_dependency_error_once() {
        let mut b = builder(&[]);
        b.add_dependency(ServiceDependency::missing("p", Some(ServiceError::new("nope"))));
        assert_eq!(b.status, ServiceStatus::DependencyError);
        b.set_error("later");
        b.add_dependency(ServiceDependency::missing("q", Some(ServiceError::new("again"))));
        assert_eq!(b.status, ServiceStatus::Error);
    }

    #[test]
    fn linking_deduplicates_instances() {
        let child = leaf(&[], ServiceStatus::Ok);
        let mut b = builder(&[]);
        b.link_to(child.clone(), None);
        b.link_to(child, None);
        assert_eq!(b.instances.len(), 1);
        assert!(!b.instances[0].owned);
        assert_eq!(b.dependencies.len(), 2);
    }

    #[test]
    fn arguments_track_usage() {
        let mut b = ServiceBuilder::new(
            ServiceName::plain(TypeRef::named("X")),
            Some(Arguments::new().with("a", 1i32).with("b", 2i32)),
            true,
        );
        assert!(b.take_argument("a").is_some());
        assert_eq!(b.unused_arguments(), vec!["b"]);
    }
}
