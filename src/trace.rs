//! Rendering of construction trees.

use std::collections::HashSet;

use crate::key::ServiceName;
use crate::record::{DependencyKind, ServiceDependency, ServiceRecord, ServiceStatus};

const ERROR_MARKER: &str = " <---------------";

/// Token sink for trace rendering.
pub trait DiagnosticWriter {
    fn write_indent(&mut self, depth: usize);
    fn write_name(&mut self, name: &str);
    /// Markers, comments and other annotations around a name.
    fn write_meta(&mut self, meta: &str);
    /// The consumed contract chain of a node, already joined.
    fn write_used_contract(&mut self, contracts: &str);
    fn write_newline(&mut self);
}

/// Plain text rendering: tab indentation, contracts in brackets.
#[derive(Debug, Default)]
pub struct TextTraceWriter {
    out: String,
}

impl TextTraceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl DiagnosticWriter for TextTraceWriter {
    fn write_indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push('\t');
        }
    }

    fn write_name(&mut self, name: &str) {
        self.out.push_str(name);
    }

    fn write_meta(&mut self, meta: &str) {
        self.out.push_str(meta);
    }

    fn write_used_contract(&mut self, contracts: &str) {
        self.out.push('[');
        self.out.push_str(contracts);
        self.out.push(']');
    }

    fn write_newline(&mut self) {
        self.out.push('\n');
    }
}

fn prefix(status: ServiceStatus, instances: usize) -> &'static str {
    match status {
        ServiceStatus::Ok | ServiceStatus::NotResolved if instances == 0 => "!",
        ServiceStatus::Ok | ServiceStatus::NotResolved if instances > 1 => "++",
        ServiceStatus::Error => "!",
        _ => "",
    }
}

fn write_tail<W: DiagnosticWriter + ?Sized>(
    writer: &mut W,
    comment: Option<&str>,
    status: ServiceStatus,
) {
    if let Some(comment) = comment {
        writer.write_meta(" - ");
        writer.write_meta(comment);
    }
    if status == ServiceStatus::Error {
        writer.write_meta(ERROR_MARKER);
    }
    writer.write_newline();
}

/// Renders `record` and everything below it.
pub fn render_record<W: DiagnosticWriter + ?Sized>(record: &ServiceRecord, writer: &mut W) {
    let mut visited = HashSet::new();
    render_node(record, None, 0, writer, &mut visited);
}

fn render_node<W: DiagnosticWriter + ?Sized>(
    record: &ServiceRecord,
    edge: Option<&ServiceDependency>,
    depth: usize,
    writer: &mut W,
    visited: &mut HashSet<*const ServiceRecord>,
) {
    // An edge may mark a healthy record as an error for its consumer, e.g. when a
    // single value was demanded and none was produced.
    let status = match edge {
        Some(edge) if edge.status == ServiceStatus::Error => ServiceStatus::Error,
        _ => record.status,
    };
    let comment = edge
        .and_then(|edge| edge.comment.as_deref())
        .or(record.comment.as_deref());
    writer.write_indent(depth);
    writer.write_meta(prefix(status, record.instances.len()));
    writer.write_name(&record.name.ty().to_string());
    if !record.name.contracts().is_empty() {
        writer.write_used_contract(&ServiceName::format_contracts(record.name.contracts()));
    }
    write_tail(writer, comment, status);

    if !visited.insert(record as *const ServiceRecord) {
        return;
    }
    for dependency in &record.dependencies {
        render_dependency(dependency, depth + 1, writer, visited);
    }
}

fn render_dependency<W: DiagnosticWriter + ?Sized>(
    dependency: &ServiceDependency,
    depth: usize,
    writer: &mut W,
    visited: &mut HashSet<*const ServiceRecord>,
) {
    match &dependency.kind {
        DependencyKind::Service(record) => {
            render_node(record, Some(dependency), depth, writer, visited)
        }
        DependencyKind::Constant { display } => {
            writer.write_indent(depth);
            writer.write_name(&dependency.name);
            writer.write_meta(" -> ");
            writer.write_meta(display);
            write_tail(writer, dependency.comment.as_deref(), dependency.status);
        }
        DependencyKind::Resource { resource } => {
            writer.write_indent(depth);
            writer.write_name(&dependency.name);
            writer.write_meta(" -> resource ");
            writer.write_meta(resource);
            write_tail(writer, dependency.comment.as_deref(), dependency.status);
        }
        DependencyKind::Missing => {
            writer.write_indent(depth);
            writer.write_meta(prefix(dependency.status, 0));
            writer.write_name(&dependency.name);
            write_tail(writer, dependency.comment.as_deref(), dependency.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::TypeRef;
    use crate::record::{ServiceError, ServiceInstance};
    use std::sync::Arc;

    fn record(
        name: &str,
        contracts: &[&str],
        status: ServiceStatus,
        instances: usize,
        dependencies: Vec<ServiceDependency>,
    ) -> Arc<ServiceRecord> {
        Arc::new(ServiceRecord {
            name: ServiceName::new(
                TypeRef::named(name),
                contracts.iter().map(|c| c.to_string()).collect(),
            ),
            status,
            instances: (0..instances)
                .map(|i| ServiceInstance { value: Arc::new(i), owned: true })
                .collect(),
            dependencies,
            comment: None,
            error: None,
            construction_index: 0,
            disposer: None,
        })
    }

    #[test]
    fn failing_parameter_is_marked() {
        let missing = ServiceDependency::missing(
            "p",
            Some(ServiceError::new("parameter not configured: [p] of service [B]")),
        );
        let b = record("B", &[], ServiceStatus::DependencyError, 0, vec![missing]);
        let a = record(
            "A",
            &[],
            ServiceStatus::DependencyError,
            0,
            vec![ServiceDependency::service("b", b)],
        );
        assert_eq!(a.trace(), "A\n\tB\n\t\t!p <---------------\n");
        assert_eq!(
            a.first_error().map(|e| e.message.as_str()),
            Some("parameter not configured: [p] of service [B]")
        );
    }

    #[test]
    fn markers_contracts_and_constants() {
        let many = record("IPlugin", &["prod"], ServiceStatus::Ok, 2, vec![]);
        let none = record("Cache", &[], ServiceStatus::NotResolved, 0, vec![]);
        let root = record(
            "App",
            &["prod"],
            ServiceStatus::Ok,
            1,
            vec![
                ServiceDependency::service("plugins", many),
                ServiceDependency::service("cache", none),
                ServiceDependency::constant("port", "8080").with_comment("argument"),
            ],
        );
        assert_eq!(
            root.trace(),
            "App[prod]\n\t++IPlugin[prod]\n\t!Cache\n\tport -> 8080 - argument\n"
        );
    }

    #[test]
    fn shared_subtree_is_rendered_once_in_depth() {
        let leaf = record("Leaf", &[], ServiceStatus::Ok, 1, vec![]);
        let shared = record("Shared", &[], ServiceStatus::Ok, 1, vec![ServiceDependency::service("l", leaf)]);
        let root = record(
            "Root",
            &[],
            ServiceStatus::Ok,
            1,
            vec![
                ServiceDependency::service("x", shared.clone()),
                ServiceDependency::service("y", shared),
            ],
        );
        assert_eq!(root.trace(), "Root\n\tShared\n\t\tLeaf\n\tShared\n");
    }

    #[test]
    fn edge_error_overrides_healthy_record() {
        let empty = record("IStore", &[], ServiceStatus::Ok, 0, vec![]);
        let edge = ServiceDependency::service("store", empty)
            .with_error(ServiceError::new("no instances for [IStore]"));
        let root = record("App", &[], ServiceStatus::DependencyError, 0, vec![edge]);
        assert_eq!(root.trace(), "App\n\t!IStore <---------------\n");
        assert_eq!(
            root.first_error().map(|e| e.message.as_str()),
            Some("no instances for [IStore]")
        );
    }
}
