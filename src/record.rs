//! Published service records: the result of building one (type, contract chain).

use std::sync::Arc;

use crate::descriptors::{AnyArc, InstanceHook};
use crate::error::{ContainerError, DiResult, SharedError};
use crate::key::ServiceName;
use crate::trace::{render_record, TextTraceWriter};

/// Outcome of building a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Ok,
    /// Nothing was built: ignored, filtered out, or an optional dependency with no source.
    NotResolved,
    /// This node failed.
    Error,
    /// A consumed dependency failed; the constructor was not invoked.
    DependencyError,
}

impl ServiceStatus {
    pub fn is_bad(self) -> bool {
        matches!(self, ServiceStatus::Error | ServiceStatus::DependencyError)
    }
}

/// One produced instance.
#[derive(Clone)]
pub struct ServiceInstance {
    pub(crate) value: AnyArc,
    /// Owned instances are disposed by the container.
    pub(crate) owned: bool,
}

impl ServiceInstance {
    pub fn value(&self) -> &AnyArc {
        &self.value
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

/// Failure attached to a record or a dependency edge.
#[derive(Debug, Clone)]
pub struct ServiceError {
    pub message: String,
    pub source: Option<SharedError>,
}

impl ServiceError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    pub(crate) fn with_source(message: impl Into<String>, source: SharedError) -> Self {
        Self { message: message.into(), source: Some(source) }
    }
}

/// Target of a dependency edge.
#[derive(Clone)]
pub enum DependencyKind {
    /// A nested service record.
    Service(Arc<ServiceRecord>),
    /// A literal value: call-time argument, parameter source, configured value or default.
    Constant { display: String },
    /// A named resource stream.
    Resource { resource: String },
    /// Nothing bound the parameter.
    Missing,
}

/// Edge from a record to something it consumed.
#[derive(Clone)]
pub struct ServiceDependency {
    pub(crate) name: String,
    pub(crate) status: ServiceStatus,
    pub(crate) kind: DependencyKind,
    pub(crate) comment: Option<String>,
    pub(crate) error: Option<ServiceError>,
}

impl ServiceDependency {
    pub(crate) fn service(name: impl Into<String>, record: Arc<ServiceRecord>) -> Self {
        Self {
            name: name.into(),
            status: record.status,
            kind: DependencyKind::Service(record),
            comment: None,
            error: None,
        }
    }

    pub(crate) fn constant(name: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ServiceStatus::Ok,
            kind: DependencyKind::Constant { display: display.into() },
            comment: None,
            error: None,
        }
    }

    pub(crate) fn resource(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ServiceStatus::Ok,
            kind: DependencyKind::Resource { resource: resource.into() },
            comment: None,
            error: None,
        }
    }

    pub(crate) fn missing(name: impl Into<String>, error: Option<ServiceError>) -> Self {
        let status = if error.is_some() { ServiceStatus::Error } else { ServiceStatus::NotResolved };
        Self { name: name.into(), status, kind: DependencyKind::Missing, comment: None, error }
    }

    pub(crate) fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Marks the edge itself as failed, whatever the target's status.
    pub(crate) fn with_error(mut self, error: ServiceError) -> Self {
        self.status = ServiceStatus::Error;
        self.error = Some(error);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn kind(&self) -> &DependencyKind {
        &self.kind
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn record(&self) -> Option<&Arc<ServiceRecord>> {
        match &self.kind {
            DependencyKind::Service(record) => Some(record),
            _ => None,
        }
    }
}

/// A finished, immutable unit of work for one service.
///
/// Shared records live in the container cache for its whole lifetime; records from
/// `create` requests belong to the caller.
pub struct ServiceRecord {
    pub(crate) name: ServiceName,
    pub(crate) status: ServiceStatus,
    pub(crate) instances: Vec<ServiceInstance>,
    pub(crate) dependencies: Vec<ServiceDependency>,
    pub(crate) comment: Option<String>,
    pub(crate) error: Option<ServiceError>,
    pub(crate) construction_index: u64,
    pub(crate) disposer: Option<InstanceHook>,
}

impl ServiceRecord {
    /// Name with the contracts the record actually consumed.
    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn used_contracts(&self) -> &[String] {
        self.name.contracts()
    }

    pub fn instances(&self) -> &[ServiceInstance] {
        &self.instances
    }

    pub fn dependencies(&self) -> &[ServiceDependency] {
        &self.dependencies
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn construction_index(&self) -> u64 {
        self.construction_index
    }

    /// Fails with the first error found depth-first, trace included.
    pub fn ensure_ok(&self) -> DiResult<()> {
        if self.status.is_bad() {
            return Err(self.to_error());
        }
        Ok(())
    }

    /// Exactly one instance, or a resolution error.
    pub fn single_value(&self) -> DiResult<AnyArc> {
        self.ensure_ok()?;
        match self.instances.as_slice() {
            [single] => Ok(single.value.clone()),
            [] => Err(self.error_with(format!("no instances for [{}]", self.name))),
            _ => Err(self.error_with(format!("many instances for [{}]", self.name))),
        }
    }

    /// Every instance, in candidate order.
    pub fn all_values(&self) -> DiResult<Vec<AnyArc>> {
        self.ensure_ok()?;
        Ok(self.instances.iter().map(|i| i.value.clone()).collect())
    }

    /// First failure, searching depth-first through consumed dependencies.
    pub fn first_error(&self) -> Option<&ServiceError> {
        if self.status == ServiceStatus::Error {
            if let Some(error) = &self.error {
                return Some(error);
            }
        }
        for dependency in &self.dependencies {
            if !dependency.status.is_bad() {
                continue;
            }
            let found = match &dependency.kind {
                DependencyKind::Service(record) => {
                    record.first_error().or(dependency.error.as_ref())
                }
                _ => dependency.error.as_ref(),
            };
            if found.is_some() {
                return found;
            }
        }
        self.error.as_ref()
    }

    /// The indented construction tree.
    pub fn trace(&self) -> String {
        let mut writer = TextTraceWriter::new();
        render_record(self, &mut writer);
        writer.finish()
    }

    pub(crate) fn to_error(&self) -> ContainerError {
        match self.first_error() {
            Some(error) => ContainerError::Resolution {
                message: error.message.clone(),
                trace: self.trace(),
                source: error.source.clone(),
            },
            None => self.error_with(format!("service [{}] failed", self.name)),
        }
    }

    fn error_with(&self, message: String) -> ContainerError {
        ContainerError::Resolution { message, trace: self.trace(), source: None }
    }
}

impl std::fmt::Debug for ServiceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRecord")
            .field("name", &self.name.to_string())
            .field("status", &self.status)
            .field("instances", &self.instances.len())
            .field("dependencies", &self.dependencies.len())
            .field("construction_index", &self.construction_index)
            .finish()
    }
}
