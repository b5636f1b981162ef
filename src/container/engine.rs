//! The resolution pipeline: context, contracts, slot locking, building and publishing.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use super::builder::ServiceBuilder;
use super::context::{self, BuilderGuard, ConstructionGuard, ContractGuard, ReplaceGuard};
use super::parameters;
use super::slot::{Acquired, Offered};
use super::strategies::ServiceBuilderHandle;
use super::Container;
use crate::contracts::ContractStack;
use crate::descriptors::{Arguments, ConstructArgs, TypeRef};
use crate::error::{ContainerError, DiResult, SharedError};
use crate::internal::panic_message;
use crate::key::ServiceName;
use crate::record::{ServiceDependency, ServiceError, ServiceRecord, ServiceStatus};
use crate::registration::CONTAINER_TYPE;

/// One resolution request.
pub(crate) struct Request<'a> {
    /// Build a fresh record, bypassing the cache.
    pub(crate) create_new: bool,
    pub(crate) arguments: Option<Arguments>,
    /// Contracts pushed for this request on top of the active chain.
    pub(crate) contracts: &'a [String],
}

impl<'a> Request<'a> {
    pub(crate) fn shared(contracts: &'a [String]) -> Self {
        Self { create_new: false, arguments: None, contracts }
    }

    pub(crate) fn fresh(arguments: Option<Arguments>, contracts: &'a [String]) -> Self {
        Self { create_new: true, arguments, contracts }
    }
}

/// Resolves `ty` under the active chain plus the request's contracts.
///
/// Never fails: problems are reported through the returned record's status.
pub(crate) fn resolve(container: &Container, ty: &TypeRef, request: Request<'_>) -> Arc<ServiceRecord> {
    let inner = &container.inner;
    let _frame = context::enter(inner.id);

    let _contracts = match ContractGuard::push(request.contracts) {
        Ok(guard) => guard,
        Err(duplicate) => {
            let mut chain = context::current_contracts();
            chain.extend(request.contracts.iter().cloned());
            return failed(
                container,
                ty,
                format!(
                    "contract [{}] already declared, all declared contracts [{}]",
                    duplicate,
                    ServiceName::format_contracts(&chain)
                ),
            );
        }
    };

    let declared = ServiceName::new(ty.clone(), context::current_contracts());
    if context::has_cycle(&declared) {
        return failed(container, ty, cycle_message(&declared));
    }

    if request.create_new || ty.name() == Some(CONTAINER_TYPE) {
        return Arc::new(build(container, &declared, request.arguments, true));
    }

    let slot = inner.slot(&declared);
    match slot.acquire(inner.settings.wait_timeout()) {
        Acquired::Ready(record) => record,
        Acquired::Claimed(claim) => {
            debug!(service = %declared, "claimed service slot");
            let record = Arc::new(build(container, &declared, None, false));
            match publish(container, &declared, record) {
                Some(record) => {
                    claim.publish(record.clone());
                    record
                }
                None => {
                    drop(claim);
                    failed(container, ty, timeout_message(&declared))
                }
            }
        }
        Acquired::OwnThread => failed(container, ty, cycle_message(&declared)),
        Acquired::TimedOut => failed(container, ty, timeout_message(&declared)),
    }
}

fn timeout_message(declared: &ServiceName) -> String {
    format!("timed out waiting for service [{}] built by another thread", declared)
}

fn cycle_message(declared: &ServiceName) -> String {
    let mut stack = context::construction_stack();
    stack.push(declared.to_string());
    format!("cyclic dependency for service [{}], stack\n\t{}", declared, stack.join("\n\t"))
}

fn next_index(container: &Container) -> u64 {
    container.inner.construction_counter.fetch_add(1, Ordering::Relaxed)
}

fn failed(container: &Container, ty: &TypeRef, message: String) -> Arc<ServiceRecord> {
    Arc::new(ServiceRecord {
        name: ServiceName::plain(ty.clone()),
        status: ServiceStatus::Error,
        instances: Vec::new(),
        dependencies: Vec::new(),
        comment: None,
        error: Some(ServiceError::new(message)),
        construction_index: next_index(container),
        disposer: None,
    })
}

fn build(
    container: &Container,
    declared: &ServiceName,
    arguments: Option<Arguments>,
    create_new: bool,
) -> ServiceRecord {
    let mut builder = ServiceBuilder::new(declared.clone(), arguments, create_new);
    {
        let _constructing = ConstructionGuard::begin(declared.clone());
        let late = BuilderGuard::push(builder.id);
        instantiate(container, &mut builder);
        for dependency in late.finish() {
            builder.add_dependency(dependency);
        }
    }
    let disposer = container
        .inner
        .universe
        .get_ref(declared.ty())
        .and_then(|def| def.disposer.clone());
    builder.finish(declared.contracts(), next_index(container), disposer)
}

fn apply_configuration(container: &Container, builder: &mut ServiceBuilder) {
    let lookup = container
        .inner
        .configuration
        .lookup(builder.ty(), builder.declared.contracts());
    if let Some(lookup) = lookup {
        if let Some(contract) = &lookup.used_contract {
            builder.use_contract(contract);
        }
        if let Some(comment) = &lookup.configuration.comment {
            builder.set_comment(comment.clone());
        }
        builder.configuration = Some(lookup.configuration);
    }
}

fn instantiate(container: &Container, builder: &mut ServiceBuilder) {
    let inner = &container.inner;
    let chain = builder.declared.contracts().to_vec();
    let configuration = inner.configuration.clone();
    let expanded = ContractStack::from(chain.clone()).expand_unions(
        |name| configuration.contract_union(name),
        |name| configuration.knows_contract(name),
    );
    match expanded {
        Err(error) => {
            builder.set_error(error.to_string());
            return;
        }
        Ok(Some(chains)) => {
            resolve_union(container, builder, &chain, chains);
            return;
        }
        Ok(None) => {}
    }

    apply_configuration(container, builder);
    if builder.configuration.as_ref().is_some_and(|c| c.ignored) {
        builder.not_resolved("ignored implementation");
        return;
    }

    let strategies = inner.strategies.clone();
    for strategy in strategies.iter() {
        if strategy.try_instantiate(container, &mut ServiceBuilderHandle(builder)) {
            debug!(service = %builder.declared, strategy = strategy.name(), "instantiated");
            break;
        }
    }
    if builder.is_bad() {
        return;
    }
    builder.apply_instance_filter();
    run_initializer(container, builder);
}

fn resolve_union(
    container: &Container,
    builder: &mut ServiceBuilder,
    chain: &[String],
    chains: Vec<Vec<String>>,
) {
    debug!(service = %builder.declared, ?chains, "expanding contract unions");
    let arguments = builder.arguments();
    builder.mark_arguments_used();
    let mut consumed = false;
    for expanded in chains {
        let _scope = ReplaceGuard::new(expanded);
        let request = Request { create_new: builder.create_new, arguments: arguments.clone(), contracts: &[] };
        let child = resolve(container, &builder.ty().clone(), request);
        consumed |= !child.used_contracts().is_empty();
        builder.link_to(child, None);
    }
    if consumed {
        let configuration = &container.inner.configuration;
        for name in chain {
            if configuration.contract_union(name).is_some() {
                builder.use_contract(name);
            }
        }
    }
}

fn run_initializer(container: &Container, builder: &mut ServiceBuilder) {
    let Some(hook) = container
        .inner
        .universe
        .get_ref(builder.ty())
        .and_then(|def| def.initializer.clone())
    else {
        return;
    };
    let owned: Vec<_> = builder
        .instances
        .iter()
        .filter(|i| i.owned)
        .map(|i| i.value.clone())
        .collect();
    for value in owned {
        match panic::catch_unwind(AssertUnwindSafe(|| hook(&value))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                let message = format!("initializer failed for [{}]: {}", builder.declared, error);
                builder.set_error_with_source(message, SharedError::new(error));
                return;
            }
            Err(payload) => {
                let message = format!(
                    "initializer panicked for [{}]: {}",
                    builder.declared,
                    panic_message(payload.as_ref())
                );
                builder.set_error(message);
                return;
            }
        }
    }
}

/// Caches a freshly built record under its final name as well.
///
/// When the record consumed fewer contracts than were active, it collapses onto the
/// slot of its final name. A record already there, or one another thread publishes
/// there while we wait, is adopted in place of ours. `None` when that wait timed out.
///
/// Every built record joins the dispose bag, adopted or not: its instances were
/// constructed here either way.
fn publish(container: &Container, declared: &ServiceName, record: Arc<ServiceRecord>) -> Option<Arc<ServiceRecord>> {
    let inner = &container.inner;
    inner.disposables.lock().push(record.clone());
    if record.name() == declared {
        debug!(service = %declared, "published service");
        return Some(record);
    }
    match inner.slot(record.name()).offer(&record, inner.settings.wait_timeout()) {
        Offered::Stored | Offered::OwnThread => {
            debug!(service = %declared, published = %record.name(), "published service");
            Some(record)
        }
        Offered::Existing(existing) => {
            debug!(service = %declared, adopted = %existing.name(), "adopted existing record");
            Some(existing)
        }
        Offered::TimedOut => None,
    }
}

/// Resolution performed by a deferred factory.
///
/// Inside the declaring constructor the ambient scope is reused and the result is
/// stitched into the declaring record; anywhere else a fresh resolution runs under
/// the chain captured when the factory was bound. `contracts` are the parameter's
/// own contracts, pushed in both cases.
pub(crate) fn resolve_deferred(
    container: &Container,
    ty: &TypeRef,
    arguments: Option<Arguments>,
    scope: &DeferredScope,
    create_new: bool,
) -> Arc<ServiceRecord> {
    let inner = &container.inner;
    let request = Request { create_new, arguments, contracts: &scope.contracts };
    if context::is_current_builder(inner.id, scope.declaring) {
        let record = resolve(container, ty, request);
        context::attach_to_current(ServiceDependency::service(ty.to_string(), record.clone()));
        return record;
    }
    let _frame = context::enter(inner.id);
    let _scope = ReplaceGuard::new(scope.ambient.clone());
    resolve(container, ty, request)
}

/// Where a deferred factory was bound.
#[derive(Debug, Clone)]
pub(crate) struct DeferredScope {
    /// Contract chain active when the parameter was bound.
    pub(crate) ambient: Vec<String>,
    /// Contracts declared on the parameter itself.
    pub(crate) contracts: Vec<String>,
    /// Builder of the declaring service.
    pub(crate) declaring: u64,
}

pub(crate) fn build_up(container: &Container, ty: &TypeRef, target: &mut dyn Any) -> DiResult<()> {
    let inner = &container.inner;
    let def = inner
        .universe
        .get_ref(ty)
        .ok_or_else(|| ContainerError::Registration(format!("type [{}] is not registered", ty)))?;
    let injector = def.injector.clone().ok_or_else(|| {
        ContainerError::Registration(format!("type [{}] declares no injectable members", ty))
    })?;

    let _frame = context::enter(inner.id);
    let declared = ServiceName::new(ty.clone(), context::current_contracts());
    let mut builder = ServiceBuilder::new(declared.clone(), None, true);
    apply_configuration(container, &mut builder);
    let values = {
        let _constructing = ConstructionGuard::begin(declared.clone());
        parameters::bind_all(container, &mut builder, def, &def.members)
    };
    let chain = declared.contracts().to_vec();
    let record = builder.finish(&chain, next_index(container), None);
    let Some(values) = values.filter(|_| !record.status.is_bad()) else {
        return Err(record.to_error());
    };
    let args = ConstructArgs::new(ty, values);
    injector(target, &args).map_err(|error| ContainerError::Resolution {
        message: format!("build-up of [{}] failed: {}", ty, error),
        trace: record.trace(),
        source: Some(SharedError::new(error)),
    })
}
